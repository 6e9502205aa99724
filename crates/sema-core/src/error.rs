//! # Error Types — Structured Error Hierarchy
//!
//! Defines the error taxonomy shared by every crate in the workspace. All
//! errors use `thiserror` for derive-based `Display` and `Error`
//! implementations.
//!
//! ## Design
//!
//! - Validation failures are returned as values from the call that detected
//!   them. The core never substitutes a default for a failed check.
//! - Every violation carries its checkpoint, its layer, the failure tag of
//!   the predicate that rejected it, and the coherence score when one had
//!   been computed, so callers can route drift without the core deciding.
//! - Callback failures (a caller predicate or transform that panicked or
//!   returned an error) are surfaced immediately as
//!   [`CoherenceError::InternalCallbackFailure`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identity::ModelHandle;
use crate::layer::{Checkpoint, ConstraintLayer, QaStage};

// ─── Violation ───────────────────────────────────────────────────────

/// A single failed constraint, with enough structure to log or route it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// Where in the call the failure was detected.
    pub checkpoint: Checkpoint,
    /// The layer whose predicate failed.
    pub layer: ConstraintLayer,
    /// Failure tag of the first failing predicate.
    pub tag: String,
    /// Coherence score at the time of failure, if one had been computed.
    pub score: Option<f64>,
}

impl Violation {
    /// Create a violation with no score attached.
    pub fn new(checkpoint: Checkpoint, layer: ConstraintLayer, tag: impl Into<String>) -> Self {
        Self {
            checkpoint,
            layer,
            tag: tag.into(),
            score: None,
        }
    }

    /// Attach a coherence score.
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} layer failed at {}: {}", self.layer, self.checkpoint, self.tag)?;
        if let Some(score) = self.score {
            write!(f, " (score {score:.3})")?;
        }
        Ok(())
    }
}

// ─── Uncorrectable ───────────────────────────────────────────────────

/// Why a redundancy set could not be corrected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UncorrectableReason {
    /// No agreement group reached a strict majority.
    NoMajority {
        /// Size of the largest agreement group.
        largest_group: usize,
        /// Minimum group size for a strict majority.
        required: usize,
        /// Number of members in the redundancy set.
        members: usize,
    },
    /// A majority existed but its candidate failed output validation.
    CorrectionFailedValidation(Violation),
}

impl std::fmt::Display for UncorrectableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoMajority {
                largest_group,
                required,
                members,
            } => write!(
                f,
                "no majority: largest agreement group {largest_group} of {members}, need {required}"
            ),
            Self::CorrectionFailedValidation(v) => {
                write!(f, "correction failed validation: {v}")
            }
        }
    }
}

// ─── OutcomeKind ─────────────────────────────────────────────────────

/// The final result kind of a call, used in audit records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    /// All checks passed.
    Success,
    /// A semantic predicate failed.
    SemanticViolation,
    /// A structural predicate failed.
    StructuralViolation,
    /// A contextual predicate failed.
    ContextualViolation,
    /// The round trip diverged from the original.
    CoherenceLost,
    /// The model handle did not resolve.
    ModelNotFound,
    /// The redundancy set could not be corrected.
    Uncorrectable,
    /// A caller callback panicked or returned an error.
    InternalCallbackFailure,
    /// A QA stage threshold was not met.
    QaGateRejected,
    /// The request or configuration was malformed.
    InvalidInput,
}

impl OutcomeKind {
    /// Returns the snake_case identifier for this outcome.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::SemanticViolation => "semantic_violation",
            Self::StructuralViolation => "structural_violation",
            Self::ContextualViolation => "contextual_violation",
            Self::CoherenceLost => "coherence_lost",
            Self::ModelNotFound => "model_not_found",
            Self::Uncorrectable => "uncorrectable",
            Self::InternalCallbackFailure => "internal_callback_failure",
            Self::QaGateRejected => "qa_gate_rejected",
            Self::InvalidInput => "invalid_input",
        }
    }
}

impl std::fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── CoherenceError ──────────────────────────────────────────────────

/// Top-level error type for the coherence engine.
#[derive(Error, Debug)]
pub enum CoherenceError {
    /// A meaning-preserving predicate failed on input or output.
    #[error("semantic violation: {0}")]
    SemanticViolation(Violation),

    /// Required structural fields missing or mismatched.
    #[error("structural violation: {0}")]
    StructuralViolation(Violation),

    /// A domain/context predicate failed.
    #[error("contextual violation: {0}")]
    ContextualViolation(Violation),

    /// Forward and output validation passed but the round trip diverged.
    #[error("coherence lost on round trip (score {score:.3}): {reason}")]
    CoherenceLost {
        /// Round-trip score between the original and the reconstruction.
        score: f64,
        /// What diverged.
        reason: String,
    },

    /// The handle does not reference a model in this registry.
    #[error("model not found: {0}")]
    ModelNotFound(ModelHandle),

    /// The redundancy set could not be corrected.
    #[error("uncorrectable: {0}")]
    Uncorrectable(UncorrectableReason),

    /// A caller-supplied callback panicked or returned an error.
    #[error("callback '{callback}' failed at {checkpoint}: {message}")]
    InternalCallbackFailure {
        /// Checkpoint at which the callback ran.
        checkpoint: Checkpoint,
        /// Failure tag or name of the callback.
        callback: String,
        /// Panic payload or error message.
        message: String,
    },

    /// A QA stage threshold was not met.
    #[error("QA gate '{stage}' rejected score {score:.3} (threshold {threshold:.3})")]
    QaGateRejected {
        /// The stage whose gate failed.
        stage: QaStage,
        /// The score presented to the gate.
        score: f64,
        /// The stage's minimum acceptable score.
        threshold: f64,
    },

    /// A threshold outside [0, 1] (or not finite) was supplied.
    #[error("threshold must be a finite value in [0, 1], got {0}")]
    InvalidThreshold(f64),

    /// Configuration or request was malformed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Semantic model definition was rejected.
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    /// Canonicalization failed.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),
}

impl CoherenceError {
    /// Wrap a violation in the variant matching its layer.
    pub fn violation(v: Violation) -> Self {
        match v.layer {
            ConstraintLayer::Semantic => Self::SemanticViolation(v),
            ConstraintLayer::Structural => Self::StructuralViolation(v),
            ConstraintLayer::Contextual => Self::ContextualViolation(v),
        }
    }

    /// The violation carried by a layer-specific variant, if any.
    pub fn as_violation(&self) -> Option<&Violation> {
        match self {
            Self::SemanticViolation(v)
            | Self::StructuralViolation(v)
            | Self::ContextualViolation(v) => Some(v),
            _ => None,
        }
    }

    /// The coherence score associated with this failure, if any.
    pub fn score(&self) -> Option<f64> {
        match self {
            Self::SemanticViolation(v)
            | Self::StructuralViolation(v)
            | Self::ContextualViolation(v) => v.score,
            Self::CoherenceLost { score, .. } | Self::QaGateRejected { score, .. } => Some(*score),
            _ => None,
        }
    }

    /// Map this error to its audit outcome kind.
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Self::SemanticViolation(_) => OutcomeKind::SemanticViolation,
            Self::StructuralViolation(_) => OutcomeKind::StructuralViolation,
            Self::ContextualViolation(_) => OutcomeKind::ContextualViolation,
            Self::CoherenceLost { .. } => OutcomeKind::CoherenceLost,
            Self::ModelNotFound(_) => OutcomeKind::ModelNotFound,
            Self::Uncorrectable(_) => OutcomeKind::Uncorrectable,
            Self::InternalCallbackFailure { .. } => OutcomeKind::InternalCallbackFailure,
            Self::QaGateRejected { .. } => OutcomeKind::QaGateRejected,
            Self::InvalidThreshold(_)
            | Self::InvalidConfig(_)
            | Self::Model(_)
            | Self::Canonicalization(_) => OutcomeKind::InvalidInput,
        }
    }
}

// ─── ModelError ──────────────────────────────────────────────────────

/// Error while constructing a semantic model.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// The model's domain name is empty.
    #[error("model domain name must not be empty")]
    EmptyDomain,

    /// A required string term was empty.
    #[error("empty {0}")]
    EmptyTerm(&'static str),

    /// A core concept was declared twice.
    #[error("duplicate core concept: {0:?}")]
    DuplicateConcept(String),

    /// A pattern string could not be parsed.
    #[error("invalid pattern {pattern:?}: {reason}")]
    InvalidPattern {
        /// The offending pattern text.
        pattern: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A pattern referenced a category the model does not declare.
    #[error("pattern references undeclared noun category {0:?}")]
    UnknownCategory(String),

    /// A representation format identifier was malformed.
    #[error("invalid format identifier {0:?}")]
    InvalidFormatId(String),
}

// ─── CanonicalizationError ───────────────────────────────────────────

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}
