//! # Coherence Context
//!
//! Request-scoped state for one pipeline run: the model and constraints in
//! force, the per-checkpoint verdicts accumulated so far, the QA stage being
//! gated, and the runtime phase with its transition log.
//!
//! A context is created per call and dropped when the call returns. It is
//! never shared between concurrent calls.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use sema_core::{
    Checkpoint, CoherenceError, ConstraintSet, QaStage, Representation, SemanticModel,
};
use sema_validate::{validate, ValidationMode, ValidationReport};

use crate::gate::QaThresholds;

// ─── PipelineState ───────────────────────────────────────────────────

/// Runtime phase of a pipeline run.
///
/// ```text
/// Idle → ValidatingInput → Transforming → ValidatingOutput ─┬─→ Done
///                                                           └─→ ReverseValidating → Done
/// any non-terminal phase → Rejected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Nothing checked yet.
    Idle,
    /// Running constraints against the input.
    ValidatingInput,
    /// Running the caller's forward transform.
    Transforming,
    /// Running constraints against the output.
    ValidatingOutput,
    /// Reconstructing the input and comparing it with the original.
    ReverseValidating,
    /// Every check passed.
    Done,
    /// A check failed.
    Rejected,
}

impl PipelineState {
    /// Returns the snake_case name of this phase.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::ValidatingInput => "validating_input",
            Self::Transforming => "transforming",
            Self::ValidatingOutput => "validating_output",
            Self::ReverseValidating => "reverse_validating",
            Self::Done => "done",
            Self::Rejected => "rejected",
        }
    }

    /// Whether this phase is final.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Rejected)
    }

    /// Whether `self → to` is an edge of the state machine.
    pub fn can_transition_to(&self, to: PipelineState) -> bool {
        use PipelineState::*;
        match (self, to) {
            (from, Rejected) => !from.is_terminal(),
            (Idle, ValidatingInput)
            | (ValidatingInput, Transforming)
            | (Transforming, ValidatingOutput)
            | (ValidatingOutput, ReverseValidating)
            | (ValidatingOutput, Done)
            | (ReverseValidating, Done) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One phase change, in order of occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTransition {
    /// Phase before the change.
    pub from: PipelineState,
    /// Phase after the change.
    pub to: PipelineState,
    /// When the change happened (UTC).
    pub at: DateTime<Utc>,
}

/// An edge outside the state machine was requested.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid pipeline transition: {from} -> {to}")]
pub struct InvalidTransition {
    /// Current phase.
    pub from: PipelineState,
    /// Requested phase.
    pub to: PipelineState,
}

impl From<InvalidTransition> for CoherenceError {
    fn from(e: InvalidTransition) -> Self {
        CoherenceError::InvalidConfig(e.to_string())
    }
}

/// The validation report produced at one checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointVerdict {
    /// Where the check ran.
    pub checkpoint: Checkpoint,
    /// What it found.
    pub report: ValidationReport,
}

// ─── CoherenceContext ────────────────────────────────────────────────

/// Mutable, per-call pipeline state.
#[derive(Debug)]
pub struct CoherenceContext<'m> {
    model: &'m SemanticModel,
    constraints: &'m ConstraintSet,
    mode: ValidationMode,
    state: PipelineState,
    qa_stage: Option<QaStage>,
    verdicts: Vec<CheckpointVerdict>,
    transitions: Vec<StateTransition>,
    forward_score: Option<f64>,
    round_trip_score: Option<f64>,
}

impl<'m> CoherenceContext<'m> {
    /// A fresh context in the `Idle` phase.
    pub fn new(model: &'m SemanticModel, constraints: &'m ConstraintSet, mode: ValidationMode) -> Self {
        Self {
            model,
            constraints,
            mode,
            state: PipelineState::Idle,
            qa_stage: None,
            verdicts: Vec::new(),
            transitions: Vec::new(),
            forward_score: None,
            round_trip_score: None,
        }
    }

    /// The model in force.
    pub fn model(&self) -> &'m SemanticModel {
        self.model
    }

    /// The constraints in force.
    pub fn constraints(&self) -> &'m ConstraintSet {
        self.constraints
    }

    /// Validation mode for every check in this run.
    pub fn mode(&self) -> ValidationMode {
        self.mode
    }

    /// Current phase.
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// The most recently gated QA stage, if the run is staged.
    pub fn qa_stage(&self) -> Option<QaStage> {
        self.qa_stage
    }

    /// Verdicts in the order the checks ran.
    pub fn verdicts(&self) -> &[CheckpointVerdict] {
        &self.verdicts
    }

    /// Phase changes in order.
    pub fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }

    /// Coherence of the output relative to the input, once computed.
    pub fn forward_score(&self) -> Option<f64> {
        self.forward_score
    }

    /// Coherence of the reconstruction relative to the input, once computed.
    pub fn round_trip_score(&self) -> Option<f64> {
        self.round_trip_score
    }

    /// The score the run is judged on: the lower of the computed scores.
    pub fn final_score(&self) -> Option<f64> {
        match (self.forward_score, self.round_trip_score) {
            (Some(f), Some(r)) => Some(f.min(r)),
            (f, r) => f.or(r),
        }
    }

    pub(crate) fn set_forward_score(&mut self, score: f64) {
        self.forward_score = Some(score);
    }

    pub(crate) fn set_round_trip_score(&mut self, score: f64) {
        self.round_trip_score = Some(score);
    }

    /// Move to another phase, recording the change.
    pub fn advance(&mut self, to: PipelineState) -> Result<(), InvalidTransition> {
        if !self.state.can_transition_to(to) {
            return Err(InvalidTransition {
                from: self.state,
                to,
            });
        }
        tracing::debug!(domain = self.model.domain(), from = %self.state, %to, "pipeline transition");
        self.transitions.push(StateTransition {
            from: self.state,
            to,
            at: Utc::now(),
        });
        self.state = to;
        Ok(())
    }

    /// Move to `Rejected` unless already terminal.
    pub fn reject(&mut self) {
        if !self.state.is_terminal() {
            // Every non-terminal phase has an edge to Rejected.
            let _ = self.advance(PipelineState::Rejected);
        }
    }

    /// Run every layer against `value`, record the report, and return it.
    pub fn check(
        &mut self,
        value: &Representation,
        checkpoint: Checkpoint,
    ) -> Result<ValidationReport, CoherenceError> {
        let report = validate(self.constraints, value, self.model, self.mode, checkpoint)?;
        self.verdicts.push(CheckpointVerdict {
            checkpoint,
            report: report.clone(),
        });
        Ok(report)
    }

    /// Gate `score` at `stage` when thresholds are supplied; a no-op otherwise.
    pub fn gate(
        &mut self,
        thresholds: Option<&QaThresholds>,
        stage: QaStage,
        score: f64,
    ) -> Result<(), CoherenceError> {
        let Some(thresholds) = thresholds else {
            return Ok(());
        };
        self.qa_stage = Some(stage);
        thresholds.enforce(stage, score)
    }
}
