//! # Transformation Records and Audit Sinks
//!
//! Every completed pipeline run, successful or rejected, produces one
//! immutable [`TransformationRecord`]. Records are handed to an optional
//! [`AuditSink`]; [`AuditTrail`] keeps them in memory.
//!
//! A record's digest is SHA-256 over its canonical JSON form, so two
//! observers holding the same record agree on its identity.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sema_core::{
    sha256_digest, CanonicalBytes, CanonicalizationError, ContentDigest, FormatId, OutcomeKind,
};

use crate::context::{CheckpointVerdict, CoherenceContext, StateTransition};

/// Immutable snapshot of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformationRecord {
    /// Unique run identifier.
    pub id: Uuid,
    /// Domain of the model in force.
    pub domain: String,
    /// Format of the input.
    pub input_format: FormatId,
    /// Requested target format.
    pub output_format: FormatId,
    /// Per-checkpoint layer verdicts, in evaluation order.
    pub verdicts: Vec<CheckpointVerdict>,
    /// Coherence of the output relative to the input, if computed.
    pub forward_score: Option<f64>,
    /// Coherence of the reconstruction relative to the input, if computed.
    pub round_trip_score: Option<f64>,
    /// Final result kind.
    pub outcome: OutcomeKind,
    /// Failure description for rejected runs.
    pub failure: Option<String>,
    /// Phase changes in order.
    pub transitions: Vec<StateTransition>,
    /// When the run finished (UTC).
    pub recorded_at: DateTime<Utc>,
}

impl TransformationRecord {
    /// Snapshot a finished context.
    pub(crate) fn capture(
        ctx: &CoherenceContext<'_>,
        input_format: FormatId,
        output_format: FormatId,
        outcome: OutcomeKind,
        failure: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            domain: ctx.model().domain().to_string(),
            input_format,
            output_format,
            verdicts: ctx.verdicts().to_vec(),
            forward_score: ctx.forward_score(),
            round_trip_score: ctx.round_trip_score(),
            outcome,
            failure,
            transitions: ctx.transitions().to_vec(),
            recorded_at: Utc::now(),
        }
    }

    /// The score the run was judged on: the lower of the forward and
    /// round-trip scores, whichever were computed.
    pub fn score(&self) -> Option<f64> {
        match (self.forward_score, self.round_trip_score) {
            (Some(f), Some(r)) => Some(f.min(r)),
            (f, r) => f.or(r),
        }
    }

    /// Whether the run succeeded.
    pub fn succeeded(&self) -> bool {
        self.outcome == OutcomeKind::Success
    }

    /// SHA-256 over the record's canonical JSON.
    pub fn digest(&self) -> Result<ContentDigest, CanonicalizationError> {
        Ok(sha256_digest(&CanonicalBytes::new(self)?))
    }
}

/// Receives one record per finished run.
pub trait AuditSink: Send + Sync {
    /// Accept a record. Must not block for long; called on the request path.
    fn record(&self, record: &TransformationRecord);
}

/// In-memory audit sink.
#[derive(Debug, Default)]
pub struct AuditTrail {
    records: Mutex<Vec<TransformationRecord>>,
}

impl AuditTrail {
    /// An empty trail.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies of every record received so far.
    pub fn records(&self) -> Vec<TransformationRecord> {
        self.records.lock().clone()
    }

    /// The most recent record.
    pub fn last(&self) -> Option<TransformationRecord> {
        self.records.lock().last().cloned()
    }

    /// Number of records received.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether no records were received.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for AuditTrail {
    fn record(&self, record: &TransformationRecord) {
        self.records.lock().push(record.clone());
    }
}
