#![deny(missing_docs)]

//! # sema-engine — Semantic Coherence Engine
//!
//! The caller-facing surface of the workspace. A [`CoherenceEngine`] is a
//! scoped handle over a model registry and the QA thresholds in force;
//! dropping or [destroying](CoherenceEngine::destroy) it releases every
//! model it holds.
//!
//! ```text
//! register_model ──► ModelHandle
//!                        │
//!   transform_with_coherence ─► validate input ─► transform ─► validate output ─► [round trip] ─► Done
//!   validate_semantic_coherence / validate_bidirectional_integrity / compute_coherence
//!   create_stream_processor ─► StreamProcessor::validate_stream_coherence
//!   correct ─► similarity clustering ─► majority ─► re-validation ─► CorrectedValue
//! ```
//!
//! The engine performs no I/O and installs no tracing subscriber.

pub mod config;
pub mod engine;
pub mod stream;

pub use config::EngineConfig;
pub use engine::CoherenceEngine;
pub use stream::{StreamBounds, StreamProcessor};

pub use sema_core::{
    Checkpoint, CoherenceError, ConstraintLayer, ConstraintSet, FieldKind, FormatId, ModelHandle,
    OutcomeKind, QaStage, Representation, SemanticModel, UncorrectableReason, VerbNounPair,
    Violation,
};
pub use sema_fault::{CorrectedValue, FaultToleranceConfig, FaultyChannel, RedundancySet, Replica};
pub use sema_pipeline::{
    AuditTrail, CallbackError, GateDecision, QaThresholds, TransformOutcome, TransformRequest,
    ValidationStrength,
};
pub use sema_validate::{validate_pair, PairRejection, PairVerdict, ScoreWeights, ValidationMode};
