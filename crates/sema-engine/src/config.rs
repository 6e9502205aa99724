//! # Engine Configuration
//!
//! Defaults applied by a [`CoherenceEngine`](crate::CoherenceEngine). Every
//! field is optional in YAML/JSON; omitted fields take the documented
//! defaults.
//!
//! ```yaml
//! weights: { concept: 0.5, structure: 0.25, task: 0.25 }
//! qa_thresholds: { intake: 0.5, processing: 0.7, completion: 0.9 }
//! fault_tolerance:
//!   expected_error_rate: 0.05
//!   redundancy_factor: 3
//!   correction_threshold: 0.9
//! round_trip_threshold: 1.0
//! validation_mode: fast_path
//! ```

use serde::{Deserialize, Serialize};

use sema_core::CoherenceError;
use sema_fault::FaultToleranceConfig;
use sema_pipeline::QaThresholds;
use sema_validate::{ScoreWeights, ValidationMode};

/// Engine-wide defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Scorer sub-score weights.
    pub weights: ScoreWeights,
    /// Initial QA thresholds; adjustable later with `set_qa_threshold`.
    pub qa_thresholds: QaThresholds,
    /// Fault tolerance parameters used when a caller does not supply its own.
    pub fault_tolerance: FaultToleranceConfig,
    /// Minimum score between an input and its reconstruction.
    pub round_trip_threshold: f64,
    /// Validation mode for transforms that do not choose one.
    pub validation_mode: ValidationMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            weights: ScoreWeights::default(),
            qa_thresholds: QaThresholds::default(),
            fault_tolerance: FaultToleranceConfig::default(),
            round_trip_threshold: 1.0,
            validation_mode: ValidationMode::FastPath,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(s: &str) -> Result<Self, CoherenceError> {
        let config: Self = serde_yaml::from_str(s)
            .map_err(|e| CoherenceError::InvalidConfig(format!("invalid YAML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(s: &str) -> Result<Self, CoherenceError> {
        let config: Self = serde_json::from_str(s)
            .map_err(|e| CoherenceError::InvalidConfig(format!("invalid JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check every field is in range.
    pub fn validate(&self) -> Result<(), CoherenceError> {
        self.weights.validate()?;
        self.fault_tolerance.validate()?;
        let t = self.round_trip_threshold;
        if !t.is_finite() || !(0.0..=1.0).contains(&t) {
            return Err(CoherenceError::InvalidThreshold(t));
        }
        Ok(())
    }
}
