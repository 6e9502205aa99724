#![deny(missing_docs)]

//! # sema-fault — Redundant Encoding and Majority Correction
//!
//! Treats faults as inherent: a value is produced N times over independent
//! paths, any of which may corrupt it, and the corrector votes the copies
//! back down to one value. Correction is fail-closed. Split evidence yields
//! `Uncorrectable` rather than a best guess, and a majority value must still
//! pass every constraint layer of the model.
//!
//! ## Modules
//!
//! - [`config`]: `FaultToleranceConfig` and its residual failure estimate.
//! - [`redundancy`]: `RedundancySet` and `Replica`.
//! - [`corrector`]: similarity-graph clustering and majority correction.
//! - [`channel`]: seeded fault-injecting channel.

pub mod channel;
pub mod config;
pub mod corrector;
pub mod redundancy;

pub use channel::{FaultyChannel, Transmission};
pub use config::FaultToleranceConfig;
pub use corrector::{CorrectedValue, Corrector};
pub use redundancy::{RedundancySet, Replica};
