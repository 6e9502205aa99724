//! # Majority Corrector
//!
//! Recovers one value from a redundancy set whose members may have been
//! corrupted independently.
//!
//! 1. Score every pair of members with the [`CoherenceScorer`]; the pairwise
//!    similarity is the lower of the two directed scores, so the matrix is
//!    symmetric.
//! 2. Union members whose similarity meets `correction_threshold` into
//!    agreement groups.
//! 3. Take the largest group (ties to the group holding the lowest
//!    provenance). Anything short of `⌊N/2⌋ + 1` members is `NoMajority`.
//! 4. Pick a representative: the lowest-provenance member when the group is
//!    bit-identical, otherwise a field-wise merge in which every key and
//!    every leaf must be backed by `⌊N/2⌋ + 1` members. The scorer compares
//!    concepts and structure, not values, so a group can hold members that
//!    disagree on a reading; any such split is `NoMajority`.
//! 5. Re-validate the representative against every constraint layer. A
//!    majority does not make a value domain-valid.
//!
//! ## Invariant
//!
//! A `CorrectedValue` has always passed the same constraints an ordinary
//! pipeline output must pass. Split evidence is never resolved by guessing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use sema_core::{
    Checkpoint, CoherenceError, ConstraintSet, Representation, SemanticModel, UncorrectableReason,
};
use sema_pipeline::CoherenceContext;
use sema_validate::{CoherenceScorer, ValidationMode};

use crate::config::FaultToleranceConfig;
use crate::redundancy::RedundancySet;

/// A successfully corrected value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectedValue {
    /// The recovered value.
    pub value: Representation,
    /// Provenance of the members in the majority group.
    pub agreeing: Vec<usize>,
    /// Provenance of the members outside it.
    pub dissenting: Vec<usize>,
    /// Share of the set backing every part of `value`, times mean
    /// intra-group similarity, in [0, 1].
    pub confidence: f64,
    /// Whether the value was merged rather than taken from one member.
    pub merged: bool,
}

/// Votes a redundancy set down to one validated value.
#[derive(Debug, Clone, Copy, Default)]
pub struct Corrector {
    scorer: CoherenceScorer,
}

impl Corrector {
    /// A corrector comparing members with `scorer`.
    pub fn new(scorer: CoherenceScorer) -> Self {
        Self { scorer }
    }

    /// Symmetric pairwise similarity of every member, indexed by position.
    pub fn similarity_matrix(&self, set: &RedundancySet, model: &SemanticModel) -> Vec<Vec<f64>> {
        let members = set.members();
        let n = members.len();
        let mut matrix = vec![vec![1.0; n]; n];
        for i in 0..n {
            for j in (i + 1)..n {
                let a = &members[i].value;
                let b = &members[j].value;
                let s = self
                    .scorer
                    .score(a, b, model)
                    .min(self.scorer.score(b, a, model));
                matrix[i][j] = s;
                matrix[j][i] = s;
            }
        }
        matrix
    }

    /// Recover the value the majority of `set` agrees on.
    ///
    /// # Errors
    ///
    /// - `InvalidConfig` if `config` is out of range or the set size is not
    ///   the configured redundancy factor.
    /// - `Uncorrectable(NoMajority)` if no agreement group reaches a strict
    ///   majority, or the group has no strict majority on some value.
    /// - `Uncorrectable(CorrectionFailedValidation)` if the majority's value
    ///   fails re-validation.
    /// - `InternalCallbackFailure` if a constraint predicate panics.
    pub fn correct(
        &self,
        set: &RedundancySet,
        config: &FaultToleranceConfig,
        model: &SemanticModel,
        constraints: &ConstraintSet,
    ) -> Result<CorrectedValue, CoherenceError> {
        config.validate()?;
        let n = set.len();
        if n != config.redundancy_factor {
            return Err(CoherenceError::InvalidConfig(format!(
                "redundancy set has {n} members, configured redundancy factor is {}",
                config.redundancy_factor
            )));
        }

        let matrix = self.similarity_matrix(set, model);
        let group = largest_group(&matrix, config.correction_threshold);
        let required = config.majority_size();
        if group.len() < required {
            tracing::warn!(
                domain = model.domain(),
                largest_group = group.len(),
                required,
                members = n,
                "redundancy set has no majority"
            );
            return Err(CoherenceError::Uncorrectable(UncorrectableReason::NoMajority {
                largest_group: group.len(),
                required,
                members: n,
            }));
        }

        let members = set.members();
        let cohesion = mean_similarity(&matrix, &group);
        let (value, merged, support) = representative(set, &group, required)?;

        let mut ctx = CoherenceContext::new(model, constraints, ValidationMode::FastPath);
        let report = ctx.check(&value, Checkpoint::Correction)?;
        if let Some(violation) = report.to_violation(Checkpoint::Correction) {
            let violation = violation.with_score(cohesion);
            tracing::warn!(
                domain = model.domain(),
                layer = %violation.layer,
                tag = %violation.tag,
                "majority candidate failed validation"
            );
            return Err(CoherenceError::Uncorrectable(
                UncorrectableReason::CorrectionFailedValidation(violation),
            ));
        }

        let agreeing: Vec<usize> = group.iter().map(|&i| members[i].provenance).collect();
        let dissenting: Vec<usize> = (0..n)
            .filter(|i| !group.contains(i))
            .map(|i| members[i].provenance)
            .collect();
        let confidence = (support as f64 / n as f64 * cohesion).clamp(0.0, 1.0);
        tracing::info!(
            domain = model.domain(),
            agreeing = agreeing.len(),
            dissenting = dissenting.len(),
            merged,
            confidence,
            "redundancy set corrected"
        );
        Ok(CorrectedValue {
            value,
            agreeing,
            dissenting,
            confidence,
            merged,
        })
    }
}

// ─── Agreement groups ────────────────────────────────────────────────

/// Disjoint sets over member positions; each root is its set's lowest position.
struct DisjointSets {
    parent: Vec<usize>,
}

impl DisjointSets {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        while self.parent[x] != root {
            let next = self.parent[x];
            self.parent[x] = root;
            x = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[ra.max(rb)] = ra.min(rb);
        }
    }
}

/// Positions of the largest agreement group, ascending.
fn largest_group(matrix: &[Vec<f64>], threshold: f64) -> Vec<usize> {
    let n = matrix.len();
    let mut sets = DisjointSets::new(n);
    for i in 0..n {
        for j in (i + 1)..n {
            if matrix[i][j] >= threshold {
                sets.union(i, j);
            }
        }
    }
    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for i in 0..n {
        let root = sets.find(i);
        groups.entry(root).or_default().push(i);
    }
    // BTreeMap iterates roots ascending, so the first maximum wins ties.
    let mut best: Vec<usize> = Vec::new();
    for group in groups.into_values() {
        if group.len() > best.len() {
            best = group;
        }
    }
    best
}

fn mean_similarity(matrix: &[Vec<f64>], group: &[usize]) -> f64 {
    let mut sum = 0.0;
    let mut pairs = 0usize;
    for (k, &i) in group.iter().enumerate() {
        for &j in &group[k + 1..] {
            sum += matrix[i][j];
            pairs += 1;
        }
    }
    if pairs == 0 {
        1.0
    } else {
        sum / pairs as f64
    }
}

// ─── Representative ──────────────────────────────────────────────────

/// The group's value, whether it was merged, and its support: the fewest
/// members backing any one decision in it.
fn representative(
    set: &RedundancySet,
    group: &[usize],
    quorum: usize,
) -> Result<(Representation, bool, usize), CoherenceError> {
    let members: Vec<&Representation> = group.iter().map(|&i| &set.members()[i].value).collect();
    let first = members[0].digest()?;
    let mut identical = true;
    for m in &members[1..] {
        if m.digest()? != first {
            identical = false;
            break;
        }
    }
    if identical {
        return Ok((members[0].clone(), false, members.len()));
    }

    let split = |best: usize| {
        tracing::warn!(group = group.len(), best, required = quorum, "agreement group splits on a value");
        CoherenceError::Uncorrectable(UncorrectableReason::NoMajority {
            largest_group: best,
            required: quorum,
            members: set.len(),
        })
    };
    let formats: Vec<_> = members.iter().map(|m| &m.format).collect();
    let tasks: Vec<_> = members.iter().map(|m| &m.task).collect();
    let payloads: Vec<_> = members.iter().map(|m| &m.payload).collect();
    let (format, format_support) = majority(&formats, quorum).map_err(split)?;
    let (task, task_support) = majority(&tasks, quorum).map_err(split)?;
    let (payload, payload_support) = merge_values(&payloads, quorum).map_err(split)?;
    let merged = Representation {
        format: format.clone(),
        payload,
        task: task.clone(),
    };
    let support = format_support.min(task_support).min(payload_support);
    Ok((merged, true, support))
}

/// The item at least `quorum` of `items` are equal to, with its count.
/// Without one, `Err` holds the highest count seen.
fn majority<'a, T: PartialEq>(items: &[&'a T], quorum: usize) -> Result<(&'a T, usize), usize> {
    let mut best = 0;
    for item in items {
        let count = items.iter().filter(|other| *other == item).count();
        if count >= quorum {
            return Ok((*item, count));
        }
        best = best.max(count);
    }
    Err(best)
}

/// Field-wise majority of `values`.
///
/// Objects merge key by key: a key is kept when at least `quorum` values
/// carry it and dropped when at least `quorum` lack it; its value is merged
/// from those that carry it. Anything else must be equal in at least
/// `quorum` values. Returns the merged value and its weakest support.
fn merge_values(values: &[&Value], quorum: usize) -> Result<(Value, usize), usize> {
    let objects: Option<Vec<&Map<String, Value>>> = values.iter().map(|v| v.as_object()).collect();
    let Some(objects) = objects else {
        return majority(values, quorum).map(|(v, count)| (v.clone(), count));
    };

    let mut keys: Vec<&String> = Vec::new();
    for obj in &objects {
        for key in obj.keys() {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
    }

    let mut out = Map::new();
    let mut support = objects.len();
    for key in keys {
        let present: Vec<&Value> = objects.iter().filter_map(|o| o.get(key)).collect();
        let absent = objects.len() - present.len();
        if present.len() >= quorum {
            let (value, count) = merge_values(&present, quorum)?;
            out.insert(key.clone(), value);
            support = support.min(count);
        } else if absent >= quorum {
            support = support.min(absent);
        } else {
            return Err(present.len().max(absent));
        }
    }
    Ok((Value::Object(out), support))
}
