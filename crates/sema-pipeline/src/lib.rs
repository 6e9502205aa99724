#![deny(missing_docs)]

//! # sema-pipeline — Bidirectional Transform Pipeline
//!
//! Runs one coherence-checked transformation:
//! validate input → transform → validate output → (optionally) reverse and
//! compare with the original. Staged requests are additionally gated by the
//! QA thresholds at each checkpoint.
//!
//! ## Modules
//!
//! - [`context`]: request-scoped `CoherenceContext` and the runtime phase log.
//! - [`pipeline`]: typestate `Run<Phase>` and the `Pipeline` driver.
//! - [`gate`]: `QaThresholds` and the QA gate.
//! - [`record`]: `TransformationRecord` and audit sinks.

pub mod context;
pub mod gate;
pub mod pipeline;
pub mod record;

pub use context::{CheckpointVerdict, CoherenceContext, InvalidTransition, PipelineState, StateTransition};
pub use gate::{GateDecision, QaThresholds};
pub use pipeline::{
    check_equivalence, CallbackError, Done, ForwardFn, Idle, InputValidated, OutputValidated, Phase,
    Pipeline, ReverseFn, Run, TransformOutcome, TransformRequest, Transformed, ValidationStrength,
    OUTPUT_FORMAT_MISMATCH, TARGET_FORMAT_NOT_ALLOWED,
};
pub use record::{AuditSink, AuditTrail, TransformationRecord};
