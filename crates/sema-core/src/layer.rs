//! # Constraint Layers, Checkpoints, and QA Stages
//!
//! The three enums every other crate matches on. Each is the single
//! definition used across the workspace; every `match` on them must be
//! exhaustive so that adding a variant forces every consumer to handle it.
//!
//! - [`ConstraintLayer`]: the three independent validator layers, in their
//!   fixed evaluation order Semantic → Structural → Contextual.
//! - [`Checkpoint`]: where in a call a verdict or failure was produced.
//! - [`QaStage`]: the three ordered QA stages and the pipeline checkpoint
//!   each one guards.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoherenceError;

// ─── ConstraintLayer ─────────────────────────────────────────────────

/// One of the three constraint layers.
///
/// The derived `Ord` follows declaration order, which is also the
/// fast-path evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintLayer {
    /// Meaning-preserving predicates.
    Semantic,
    /// Required fields present and type-compatible.
    Structural,
    /// Domain and context predicates (ranges, verb-noun domains).
    Contextual,
}

impl ConstraintLayer {
    /// All layers in evaluation order.
    pub fn all() -> &'static [ConstraintLayer] {
        &[Self::Semantic, Self::Structural, Self::Contextual]
    }

    /// Returns the snake_case identifier for this layer.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Semantic => "semantic",
            Self::Structural => "structural",
            Self::Contextual => "contextual",
        }
    }
}

impl std::fmt::Display for ConstraintLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConstraintLayer {
    type Err = CoherenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "semantic" => Ok(Self::Semantic),
            "structural" => Ok(Self::Structural),
            "contextual" => Ok(Self::Contextual),
            other => Err(CoherenceError::InvalidConfig(format!(
                "unknown constraint layer: {other:?}"
            ))),
        }
    }
}

// ─── Checkpoint ──────────────────────────────────────────────────────

/// The point in a call at which a verdict was recorded or a failure detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Checkpoint {
    /// Validation of the caller's input before any transform.
    InputValidation,
    /// The delegated forward transform.
    Transform,
    /// Validation of the transform's output.
    OutputValidation,
    /// Reverse transform and round-trip comparison.
    ReverseValidation,
    /// Re-validation of a majority-vote candidate.
    Correction,
    /// Per-reading stream validation.
    Stream,
}

impl Checkpoint {
    /// Returns the snake_case identifier for this checkpoint.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InputValidation => "input_validation",
            Self::Transform => "transform",
            Self::OutputValidation => "output_validation",
            Self::ReverseValidation => "reverse_validation",
            Self::Correction => "correction",
            Self::Stream => "stream",
        }
    }
}

impl std::fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── QaStage ─────────────────────────────────────────────────────────

/// The three ordered QA stages.
///
/// | Stage | Guards checkpoint |
/// |-------|-------------------|
/// | Intake | input validation |
/// | Processing | transform |
/// | Completion | output validation |
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QaStage {
    /// Gate on the incoming value.
    Intake,
    /// Gate on the forward transform.
    Processing,
    /// Gate on the final result.
    Completion,
}

impl QaStage {
    /// All stages in order.
    pub fn all() -> &'static [QaStage] {
        &[Self::Intake, Self::Processing, Self::Completion]
    }

    /// The pipeline checkpoint this stage guards.
    pub fn checkpoint(&self) -> Checkpoint {
        match self {
            Self::Intake => Checkpoint::InputValidation,
            Self::Processing => Checkpoint::Transform,
            Self::Completion => Checkpoint::OutputValidation,
        }
    }

    /// Returns the snake_case identifier for this stage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Intake => "intake",
            Self::Processing => "processing",
            Self::Completion => "completion",
        }
    }
}

impl std::fmt::Display for QaStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QaStage {
    type Err = CoherenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "intake" => Ok(Self::Intake),
            "processing" => Ok(Self::Processing),
            "completion" => Ok(Self::Completion),
            other => Err(CoherenceError::InvalidConfig(format!(
                "unknown QA stage: {other:?}"
            ))),
        }
    }
}
