//! # QA Gate Controller
//!
//! Stage-scoped minimum scores. Each of the three ordered stages maps to a
//! pipeline checkpoint:
//!
//! | Stage | Checkpoint | Score gated |
//! |-------|------------|-------------|
//! | Intake | input validation | required-field ratio of the input |
//! | Processing | transform | forward coherence score |
//! | Completion | output validation, after the round trip | final score (min of forward and round trip) |
//!
//! Completion is checked once the reverse transform (if any) has run, so a
//! round trip that scores below the forward transform can still hold the
//! output back. Without a reverse transform the final score is the forward
//! score and Completion gates at output validation.
//!
//! `gate` is a plain `score >= threshold` comparison. Thresholds are
//! independent per stage; `Completion >= Processing >= Intake` is a
//! convention reported by [`QaThresholds::is_monotonic`], not enforced.

use serde::{Deserialize, Serialize};

use sema_core::{CoherenceError, QaStage};

/// Outcome of a gate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateDecision {
    /// Score met the threshold.
    Pass,
    /// Score fell below the threshold (or was not a number).
    Fail,
}

impl GateDecision {
    /// Whether the gate passed.
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }
}

/// Minimum acceptable score per QA stage, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawThresholds", into = "RawThresholds")]
pub struct QaThresholds {
    intake: f64,
    processing: f64,
    completion: f64,
}

#[derive(Serialize, Deserialize)]
struct RawThresholds {
    intake: f64,
    processing: f64,
    completion: f64,
}

impl QaThresholds {
    /// Validated thresholds.
    ///
    /// # Errors
    ///
    /// `InvalidThreshold` if any value is outside [0, 1] or not finite.
    pub fn new(intake: f64, processing: f64, completion: f64) -> Result<Self, CoherenceError> {
        for t in [intake, processing, completion] {
            check_threshold(t)?;
        }
        Ok(Self {
            intake,
            processing,
            completion,
        })
    }

    /// The threshold for `stage`.
    pub fn get(&self, stage: QaStage) -> f64 {
        match stage {
            QaStage::Intake => self.intake,
            QaStage::Processing => self.processing,
            QaStage::Completion => self.completion,
        }
    }

    /// Replace the threshold for `stage`.
    pub fn set(&mut self, stage: QaStage, threshold: f64) -> Result<(), CoherenceError> {
        check_threshold(threshold)?;
        let slot = match stage {
            QaStage::Intake => &mut self.intake,
            QaStage::Processing => &mut self.processing,
            QaStage::Completion => &mut self.completion,
        };
        *slot = threshold;
        Ok(())
    }

    /// Whether `Completion >= Processing >= Intake` holds.
    pub fn is_monotonic(&self) -> bool {
        self.intake <= self.processing && self.processing <= self.completion
    }

    /// Compare `score` against the stage's threshold.
    pub fn gate(&self, stage: QaStage, score: f64) -> GateDecision {
        if score >= self.get(stage) {
            GateDecision::Pass
        } else {
            GateDecision::Fail
        }
    }

    /// Like [`gate`](Self::gate), but a failure is a `QaGateRejected` error.
    pub fn enforce(&self, stage: QaStage, score: f64) -> Result<(), CoherenceError> {
        match self.gate(stage, score) {
            GateDecision::Pass => Ok(()),
            GateDecision::Fail => {
                let threshold = self.get(stage);
                tracing::warn!(%stage, score, threshold, "QA gate rejected");
                Err(CoherenceError::QaGateRejected {
                    stage,
                    score,
                    threshold,
                })
            }
        }
    }
}

impl Default for QaThresholds {
    fn default() -> Self {
        Self {
            intake: 0.5,
            processing: 0.7,
            completion: 0.9,
        }
    }
}

impl TryFrom<RawThresholds> for QaThresholds {
    type Error = CoherenceError;

    fn try_from(raw: RawThresholds) -> Result<Self, Self::Error> {
        Self::new(raw.intake, raw.processing, raw.completion)
    }
}

impl From<QaThresholds> for RawThresholds {
    fn from(t: QaThresholds) -> Self {
        Self {
            intake: t.intake,
            processing: t.processing,
            completion: t.completion,
        }
    }
}

fn check_threshold(t: f64) -> Result<(), CoherenceError> {
    if t.is_finite() && (0.0..=1.0).contains(&t) {
        Ok(())
    } else {
        Err(CoherenceError::InvalidThreshold(t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn defaults_are_monotonic() {
        let t = QaThresholds::default();
        assert!(t.is_monotonic());
        assert_eq!(t.get(QaStage::Intake), 0.5);
        assert_eq!(t.get(QaStage::Completion), 0.9);
    }

    #[test]
    fn out_of_range_rejected() {
        let mut t = QaThresholds::default();
        for bad in [-0.01, 1.01, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                t.set(QaStage::Processing, bad),
                Err(CoherenceError::InvalidThreshold(_))
            ));
        }
        assert_eq!(t.get(QaStage::Processing), 0.7);
        assert!(QaThresholds::new(0.0, 2.0, 1.0).is_err());
    }

    #[test]
    fn ordering_not_enforced() {
        let mut t = QaThresholds::default();
        t.set(QaStage::Intake, 1.0).unwrap();
        assert!(!t.is_monotonic());
        assert_eq!(t.gate(QaStage::Intake, 0.99), GateDecision::Fail);
    }

    #[test]
    fn boundary_score_passes() {
        let t = QaThresholds::default();
        assert!(t.gate(QaStage::Processing, 0.7).is_pass());
        assert!(!t.gate(QaStage::Processing, f64::NAN).is_pass());
    }

    #[test]
    fn enforce_reports_stage() {
        let err = QaThresholds::default()
            .enforce(QaStage::Completion, 0.5)
            .unwrap_err();
        assert!(matches!(
            err,
            CoherenceError::QaGateRejected { stage: QaStage::Completion, threshold, .. } if threshold == 0.9
        ));
    }

    #[test]
    fn serde_validates() {
        let t: QaThresholds =
            serde_json::from_str(r#"{"intake":0.1,"processing":0.2,"completion":0.3}"#).unwrap();
        assert_eq!(t.get(QaStage::Processing), 0.2);
        assert!(serde_json::from_str::<QaThresholds>(r#"{"intake":1.5,"processing":0.2,"completion":0.3}"#).is_err());
    }

    proptest! {
        #[test]
        fn lower_threshold_never_flips_pass_to_fail(
            a in 0.0f64..=1.0,
            b in 0.0f64..=1.0,
            s in 0.0f64..=1.0,
        ) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            for &stage in QaStage::all() {
                let mut strict = QaThresholds::default();
                strict.set(stage, hi).unwrap();
                let mut lax = QaThresholds::default();
                lax.set(stage, lo).unwrap();
                if strict.gate(stage, s).is_pass() {
                    prop_assert!(lax.gate(stage, s).is_pass());
                }
            }
        }
    }
}
