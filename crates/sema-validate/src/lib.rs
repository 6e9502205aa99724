#![deny(missing_docs)]

//! # sema-validate — Constraint Validation and Coherence Scoring
//!
//! The checkers every transformation passes through:
//!
//! - [`constraints`]: three-layer evaluation of caller predicates, with a
//!   fast pass/fail path and a full diagnostic report.
//! - [`verb_noun`]: closed-world validation of task descriptors against the
//!   model's exact and wildcard pair rules.
//! - [`scorer`]: graded coherence between two representations.
//! - [`standard`]: constraints derived from the model itself.
//!
//! Nothing in this crate holds state between calls.

pub mod constraints;
pub mod scorer;
pub mod standard;
pub mod verb_noun;

pub use constraints::{check_layer, validate, LayerVerdict, ValidationMode, ValidationReport, Verdict};
pub use scorer::{required_field_ratio, CoherenceScorer, ScoreBreakdown, ScoreWeights};
pub use standard::standard_constraints;
pub use verb_noun::{validate_pair, PairRejection, PairVerdict};
