//! # Representation
//!
//! A value in one concrete representation: an opaque format tag, a JSON
//! payload, and optionally the task descriptor it claims to carry. Every
//! validator, the scorer, the pipeline and the corrector operate on this one
//! type, so the same semantic contract applies to ordinary transforms and to
//! corrected replicas alike.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::canonical::CanonicalBytes;
use crate::digest::{sha256_digest, ContentDigest};
use crate::error::CanonicalizationError;
use crate::identity::FormatId;
use crate::model::{SemanticModel, VerbNounPair};

/// One representation of a logical value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Representation {
    /// Which representation this is.
    pub format: FormatId,
    /// The encoded value.
    pub payload: Value,
    /// The task descriptor carried alongside the value, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<VerbNounPair>,
}

impl Representation {
    /// Create a representation without a task descriptor.
    pub fn new(format: FormatId, payload: Value) -> Self {
        Self {
            format,
            payload,
            task: None,
        }
    }

    /// Attach a task descriptor.
    pub fn with_task(mut self, task: VerbNounPair) -> Self {
        self.task = Some(task);
        self
    }

    /// Core concepts of `model` mentioned by this representation.
    ///
    /// A concept is mentioned when it appears as an object key or a string
    /// leaf anywhere in the payload, or as the task's verb or noun.
    pub fn concepts<'m>(&self, model: &'m SemanticModel) -> BTreeSet<&'m str> {
        let mut found = BTreeSet::new();
        let mut note = |term: &str| {
            if let Some(concept) = model.core_concepts().iter().find(|c| c.as_str() == term) {
                found.insert(concept.as_str());
            }
        };
        visit_terms(&self.payload, &mut note);
        if let Some(task) = &self.task {
            note(&task.verb);
            note(&task.noun);
        }
        found
    }

    /// Content digest over the canonical form of format, payload and task.
    pub fn digest(&self) -> Result<ContentDigest, CanonicalizationError> {
        Ok(sha256_digest(&CanonicalBytes::new(self)?))
    }

    /// Content digest over the payload alone.
    pub fn payload_digest(&self) -> Result<ContentDigest, CanonicalizationError> {
        Ok(sha256_digest(&CanonicalBytes::new(&self.payload)?))
    }
}

fn visit_terms(value: &Value, note: &mut impl FnMut(&str)) {
    match value {
        Value::String(s) => note(s),
        Value::Array(items) => items.iter().for_each(|v| visit_terms(v, note)),
        Value::Object(map) => {
            for (k, v) in map {
                note(k);
                visit_terms(v, note);
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}
