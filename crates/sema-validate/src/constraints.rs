//! # Three-Layer Constraint Evaluation
//!
//! Evaluates a [`ConstraintSet`] against a value in the fixed layer order
//! Semantic → Structural → Contextual.
//!
//! ## Modes
//!
//! - [`ValidationMode::FastPath`]: pass/fail only. Stops at the first failing
//!   predicate, so later predicates and later layers are never invoked.
//! - [`ValidationMode::FullReport`]: every predicate of every layer runs once
//!   and every failure tag is collected.
//!
//! ## Invariant
//!
//! Each registered predicate is invoked at most once per call. A panicking
//! predicate aborts the call with `InternalCallbackFailure`; it is not
//! counted as a failed check.

use serde::{Deserialize, Serialize};

use sema_core::{
    guarded, Checkpoint, CoherenceError, ConstraintLayer, ConstraintSet, Representation,
    SemanticModel, Violation,
};

/// How much work a validation call does.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    /// Stop at the first failure.
    #[default]
    FastPath,
    /// Evaluate everything and collect every failure.
    FullReport,
}

/// Outcome of checking one layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Every predicate in the layer held.
    Pass,
    /// The first failing predicate's tag.
    Fail(String),
}

impl Verdict {
    /// Whether the layer passed.
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }
}

/// Per-layer result inside a [`ValidationReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerVerdict {
    /// The layer checked.
    pub layer: ConstraintLayer,
    /// Number of predicates invoked.
    pub evaluated: usize,
    /// Tags of the predicates that returned false, in registration order.
    pub failed: Vec<String>,
}

impl LayerVerdict {
    /// Whether no predicate in this layer failed.
    pub fn passed(&self) -> bool {
        self.failed.is_empty()
    }

    /// Collapse to a [`Verdict`].
    pub fn verdict(&self) -> Verdict {
        match self.failed.first() {
            None => Verdict::Pass,
            Some(tag) => Verdict::Fail(tag.clone()),
        }
    }
}

/// Result of validating one value against a constraint set.
///
/// In fast-path mode, layers after the first failure are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Evaluated layers in evaluation order.
    pub layers: Vec<LayerVerdict>,
}

impl ValidationReport {
    /// Whether every evaluated layer passed.
    pub fn passed(&self) -> bool {
        self.layers.iter().all(LayerVerdict::passed)
    }

    /// The verdict for `layer`, if it was evaluated.
    pub fn layer(&self, layer: ConstraintLayer) -> Option<&LayerVerdict> {
        self.layers.iter().find(|l| l.layer == layer)
    }

    /// The first failing layer and its first failing tag.
    pub fn first_failure(&self) -> Option<(ConstraintLayer, &str)> {
        self.layers
            .iter()
            .find_map(|l| l.failed.first().map(|tag| (l.layer, tag.as_str())))
    }

    /// Fraction of invoked predicates that held. 1.0 when none were invoked.
    pub fn pass_ratio(&self) -> f64 {
        let evaluated: usize = self.layers.iter().map(|l| l.evaluated).sum();
        if evaluated == 0 {
            return 1.0;
        }
        let failed: usize = self.layers.iter().map(|l| l.failed.len()).sum();
        (evaluated - failed) as f64 / evaluated as f64
    }

    /// The first failure as a [`Violation`] at `checkpoint`.
    pub fn to_violation(&self, checkpoint: Checkpoint) -> Option<Violation> {
        self.first_failure()
            .map(|(layer, tag)| Violation::new(checkpoint, layer, tag))
    }

    /// `Ok(())` if passed, otherwise the layer-specific violation error.
    pub fn into_result(self, checkpoint: Checkpoint) -> Result<(), CoherenceError> {
        match self.to_violation(checkpoint) {
            None => Ok(()),
            Some(v) => Err(CoherenceError::violation(v)),
        }
    }
}

/// Check a single layer. Stops at the first failing predicate.
pub fn check_layer(
    constraints: &ConstraintSet,
    layer: ConstraintLayer,
    value: &Representation,
    model: &SemanticModel,
    checkpoint: Checkpoint,
) -> Result<Verdict, CoherenceError> {
    let verdict = evaluate_layer(constraints, layer, value, model, checkpoint, ValidationMode::FastPath)?;
    Ok(verdict.verdict())
}

/// Check every layer in order.
pub fn validate(
    constraints: &ConstraintSet,
    value: &Representation,
    model: &SemanticModel,
    mode: ValidationMode,
    checkpoint: Checkpoint,
) -> Result<ValidationReport, CoherenceError> {
    let mut report = ValidationReport::default();
    for &layer in ConstraintLayer::all() {
        let verdict = evaluate_layer(constraints, layer, value, model, checkpoint, mode)?;
        let failed = !verdict.passed();
        report.layers.push(verdict);
        if failed && mode == ValidationMode::FastPath {
            break;
        }
    }

    if let Some((layer, tag)) = report.first_failure() {
        tracing::debug!(
            domain = model.domain(),
            %checkpoint,
            %layer,
            tag,
            "constraint check failed"
        );
    }
    Ok(report)
}

fn evaluate_layer(
    constraints: &ConstraintSet,
    layer: ConstraintLayer,
    value: &Representation,
    model: &SemanticModel,
    checkpoint: Checkpoint,
    mode: ValidationMode,
) -> Result<LayerVerdict, CoherenceError> {
    let mut verdict = LayerVerdict {
        layer,
        evaluated: 0,
        failed: Vec::new(),
    };
    for constraint in constraints.layer(layer) {
        let holds = guarded(checkpoint, constraint.tag(), || constraint.holds(value, model))?;
        verdict.evaluated += 1;
        if !holds {
            verdict.failed.push(constraint.tag().to_string());
            if mode == ValidationMode::FastPath {
                break;
            }
        }
    }
    Ok(verdict)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use sema_core::FormatId;
    use serde_json::json;

    fn model() -> SemanticModel {
        SemanticModel::builder("d").build().unwrap()
    }

    fn value() -> Representation {
        Representation::new(FormatId::new("json").unwrap(), json!({"a": 1}))
    }

    fn counting(
        set: ConstraintSet,
        layer: ConstraintLayer,
        tag: &str,
        result: bool,
        calls: &Arc<AtomicUsize>,
    ) -> ConstraintSet {
        let calls = Arc::clone(calls);
        set.with_predicate(layer, tag, move |_, _| {
            calls.fetch_add(1, Ordering::SeqCst);
            result
        })
    }

    #[test]
    fn empty_set_passes() {
        let report = validate(
            &ConstraintSet::new(),
            &value(),
            &model(),
            ValidationMode::FullReport,
            Checkpoint::InputValidation,
        )
        .unwrap();
        assert!(report.passed());
        assert_eq!(report.layers.len(), 3);
        assert_eq!(report.pass_ratio(), 1.0);
    }

    #[test]
    fn fast_path_stops_at_first_failing_layer() {
        let calls = Arc::new(AtomicUsize::new(0));
        let set = ConstraintSet::new();
        let set = counting(set, ConstraintLayer::Semantic, "s_ok", true, &calls);
        let set = counting(set, ConstraintLayer::Structural, "st_bad", false, &calls);
        let set = counting(set, ConstraintLayer::Structural, "st_never", false, &calls);
        let set = counting(set, ConstraintLayer::Contextual, "c_never", true, &calls);

        let report = validate(&set, &value(), &model(), ValidationMode::FastPath, Checkpoint::InputValidation)
            .unwrap();
        assert!(!report.passed());
        assert_eq!(report.first_failure(), Some((ConstraintLayer::Structural, "st_bad")));
        assert!(report.layer(ConstraintLayer::Contextual).is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn full_report_runs_every_predicate_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let set = ConstraintSet::new();
        let set = counting(set, ConstraintLayer::Semantic, "s_bad", false, &calls);
        let set = counting(set, ConstraintLayer::Structural, "st_bad", false, &calls);
        let set = counting(set, ConstraintLayer::Contextual, "c_ok", true, &calls);

        let report = validate(&set, &value(), &model(), ValidationMode::FullReport, Checkpoint::OutputValidation)
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(report.first_failure(), Some((ConstraintLayer::Semantic, "s_bad")));
        assert!(!report.layer(ConstraintLayer::Structural).unwrap().passed());
        assert!(report.layer(ConstraintLayer::Contextual).unwrap().passed());
        assert!((report.pass_ratio() - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn violation_carries_checkpoint_and_layer() {
        let set = ConstraintSet::new().with_predicate(ConstraintLayer::Contextual, "range", |_, _| false);
        let err = validate(&set, &value(), &model(), ValidationMode::FastPath, Checkpoint::Stream)
            .unwrap()
            .into_result(Checkpoint::Stream)
            .unwrap_err();
        let v = err.as_violation().unwrap();
        assert_eq!(v.layer, ConstraintLayer::Contextual);
        assert_eq!(v.checkpoint, Checkpoint::Stream);
        assert_eq!(v.tag, "range");
        assert!(matches!(err, CoherenceError::ContextualViolation(_)));
    }

    #[test]
    fn panicking_predicate_is_callback_failure() {
        let set = ConstraintSet::new().with_predicate(ConstraintLayer::Semantic, "explodes", |_, _| {
            panic!("predicate bug")
        });
        let err = validate(&set, &value(), &model(), ValidationMode::FullReport, Checkpoint::InputValidation)
            .unwrap_err();
        assert!(matches!(
            err,
            CoherenceError::InternalCallbackFailure { ref callback, .. } if callback == "explodes"
        ));
    }

    #[test]
    fn check_layer_reports_first_tag() {
        let set = ConstraintSet::new()
            .with_predicate(ConstraintLayer::Structural, "a", |_, _| true)
            .with_predicate(ConstraintLayer::Structural, "b", |_, _| false);
        let verdict = check_layer(
            &set,
            ConstraintLayer::Structural,
            &value(),
            &model(),
            Checkpoint::OutputValidation,
        )
        .unwrap();
        assert_eq!(verdict, Verdict::Fail("b".into()));
        assert!(check_layer(&set, ConstraintLayer::Semantic, &value(), &model(), Checkpoint::OutputValidation)
            .unwrap()
            .is_pass());
    }
}
