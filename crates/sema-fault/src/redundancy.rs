//! # Redundancy Sets
//!
//! N independently produced encodings of one logical value, each tagged with
//! the provenance index of the path that produced it. Members are expected
//! to agree; divergence signals a fault on some path, not necessarily in the
//! true value.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use sema_core::{CoherenceError, Representation};

/// One member of a redundancy set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Replica {
    /// Which production path this replica came from.
    pub provenance: usize,
    /// The encoded value.
    pub value: Representation,
}

impl Replica {
    /// Tag `value` with `provenance`.
    pub fn new(provenance: usize, value: Representation) -> Self {
        Self { provenance, value }
    }
}

/// At least two replicas with distinct provenance, ordered by provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedundancySet {
    members: Vec<Replica>,
}

impl RedundancySet {
    /// Build a set from independently produced replicas.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for fewer than two members or a repeated provenance.
    pub fn new(mut members: Vec<Replica>) -> Result<Self, CoherenceError> {
        if members.len() < 2 {
            return Err(CoherenceError::InvalidConfig(format!(
                "a redundancy set needs at least 2 members, got {}",
                members.len()
            )));
        }
        let mut seen = BTreeSet::new();
        for m in &members {
            if !seen.insert(m.provenance) {
                return Err(CoherenceError::InvalidConfig(format!(
                    "duplicate replica provenance {}",
                    m.provenance
                )));
            }
        }
        members.sort_by_key(|m| m.provenance);
        Ok(Self { members })
    }

    /// Replicate `value` into `n` identical members with provenance `0..n`.
    pub fn encode(value: &Representation, n: usize) -> Result<Self, CoherenceError> {
        Self::new(
            (0..n)
                .map(|provenance| Replica::new(provenance, value.clone()))
                .collect(),
        )
    }

    /// Members in provenance order.
    pub fn members(&self) -> &[Replica] {
        &self.members
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Always false; a set has at least two members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Consume the set, yielding its members.
    pub fn into_members(self) -> Vec<Replica> {
        self.members
    }
}
