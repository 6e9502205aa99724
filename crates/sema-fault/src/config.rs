//! # Fault Tolerance Configuration
//!
//! Parameters of a redundant channel: how often a replica is expected to be
//! corrupted, how many replicas are produced, and how similar two replicas
//! must be to count as agreeing.

use serde::{Deserialize, Serialize};

use sema_core::CoherenceError;

/// Redundancy and correction parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaultToleranceConfig {
    /// Probability that any one replica is corrupted, in [0, 1].
    pub expected_error_rate: f64,
    /// Number of replicas N (at least 2; odd avoids tie votes).
    pub redundancy_factor: usize,
    /// Minimum pairwise coherence for two replicas to agree, in (0, 1].
    pub correction_threshold: f64,
}

impl FaultToleranceConfig {
    /// Validated configuration.
    pub fn new(
        expected_error_rate: f64,
        redundancy_factor: usize,
        correction_threshold: f64,
    ) -> Result<Self, CoherenceError> {
        let config = Self {
            expected_error_rate,
            redundancy_factor,
            correction_threshold,
        };
        config.validate()?;
        if redundancy_factor % 2 == 0 {
            tracing::warn!(redundancy_factor, "even redundancy factor allows tied votes");
        }
        Ok(config)
    }

    /// Check every field is in range.
    pub fn validate(&self) -> Result<(), CoherenceError> {
        let rate = self.expected_error_rate;
        if !rate.is_finite() || !(0.0..=1.0).contains(&rate) {
            return Err(CoherenceError::InvalidConfig(format!(
                "expected_error_rate must be in [0, 1], got {rate}"
            )));
        }
        if self.redundancy_factor < 2 {
            return Err(CoherenceError::InvalidConfig(format!(
                "redundancy_factor must be at least 2, got {}",
                self.redundancy_factor
            )));
        }
        let t = self.correction_threshold;
        if !t.is_finite() || t <= 0.0 || t > 1.0 {
            return Err(CoherenceError::InvalidConfig(format!(
                "correction_threshold must be in (0, 1], got {t}"
            )));
        }
        Ok(())
    }

    /// Smallest group forming a strict majority: `⌊N/2⌋ + 1`.
    pub fn majority_size(&self) -> usize {
        self.redundancy_factor / 2 + 1
    }

    /// Probability that fewer than a majority of replicas survive
    /// uncorrupted, assuming independent corruption at the expected rate.
    pub fn residual_failure_probability(&self) -> f64 {
        let n = self.redundancy_factor;
        let p = self.expected_error_rate;
        let tolerated = n - self.majority_size();
        ((tolerated + 1)..=n)
            .map(|k| binomial(n, k) * p.powi(k as i32) * (1.0 - p).powi((n - k) as i32))
            .sum::<f64>()
            .clamp(0.0, 1.0)
    }
}

impl Default for FaultToleranceConfig {
    fn default() -> Self {
        Self {
            expected_error_rate: 0.05,
            redundancy_factor: 3,
            correction_threshold: 0.9,
        }
    }
}

fn binomial(n: usize, k: usize) -> f64 {
    let k = k.min(n - k);
    (0..k).fold(1.0, |acc, i| acc * (n - i) as f64 / (i + 1) as f64)
}
