#![deny(missing_docs)]

//! # sema-core — Foundational Types for the Coherence Engine
//!
//! This crate is the leaf of the workspace DAG. It defines the data model
//! every other crate operates on and depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Immutable models.** A `SemanticModel` is validated and indexed once
//!    at construction and never mutated afterwards. Serde routes through the
//!    same validation (`#[serde(try_from = "ModelDefinition")]`).
//!
//! 2. **One representation type.** `Representation` (format tag + JSON
//!    payload + optional task) is what validators, the scorer, the pipeline
//!    and the corrector all consume.
//!
//! 3. **Single layer/stage enums.** `ConstraintLayer`, `Checkpoint` and
//!    `QaStage` are defined once and matched exhaustively everywhere.
//!
//! 4. **Errors are values.** `CoherenceError` carries the full taxonomy;
//!    every violation records checkpoint, layer, tag and optional score.
//!
//! 5. **Digests flow through `CanonicalBytes`.** Replica fingerprints and
//!    audit-record digests are SHA-256 over JCS bytes.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `sema-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod callback;
pub mod canonical;
pub mod constraint;
pub mod digest;
pub mod error;
pub mod identity;
pub mod layer;
pub mod model;
pub mod registry;
pub mod representation;

// Re-export primary types for ergonomic imports.
pub use callback::guarded;
pub use canonical::CanonicalBytes;
pub use constraint::{Constraint, ConstraintSet, Predicate};
pub use digest::{sha256_digest, ContentDigest};
pub use error::{
    CanonicalizationError, CoherenceError, ModelError, OutcomeKind, UncorrectableReason, Violation,
};
pub use identity::{FormatId, ModelHandle, RegistryId};
pub use layer::{Checkpoint, ConstraintLayer, QaStage};
pub use model::{
    FieldKind, FieldSpec, ModelDefinition, PairRule, SemanticModel, SemanticModelBuilder,
    TermPattern, VerbNounPair,
};
pub use registry::{ModelRegistry, RegisteredModel};
pub use representation::Representation;
