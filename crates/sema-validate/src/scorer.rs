//! # Coherence Scorer
//!
//! Graded agreement between two representations of one logical value under
//! a semantic model. The score is a weighted mean of three sub-scores, each
//! in [0, 1]:
//!
//! | Term | Measures |
//! |------|----------|
//! | concept | Jaccard overlap of the model's core concepts mentioned by each side |
//! | structure | required fields satisfied by the source that are still satisfied by the target |
//! | task | whether the target's verb-noun task is valid (or unchanged) |
//!
//! ## Invariants
//!
//! - `score(x, x, m) == 1.0` for every `x`: each sub-score is relative to
//!   the source, so self-comparison is perfect regardless of validity.
//! - The result lies in [0, 1] and is non-decreasing in each sub-score,
//!   since the weights are non-negative and normalized.

use serde::{Deserialize, Serialize};

use sema_core::{CoherenceError, Representation, SemanticModel};

use crate::verb_noun::validate_pair;

/// Relative weights of the three sub-scores.
///
/// Weights need not sum to 1; they are normalized at scoring time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    /// Weight of the concept-overlap term.
    pub concept: f64,
    /// Weight of the required-field correspondence term.
    pub structure: f64,
    /// Weight of the verb-noun task term.
    pub task: f64,
}

impl ScoreWeights {
    /// Validated weights.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if any weight is negative or non-finite, or all are zero.
    pub fn new(concept: f64, structure: f64, task: f64) -> Result<Self, CoherenceError> {
        let weights = Self {
            concept,
            structure,
            task,
        };
        weights.validate()?;
        Ok(weights)
    }

    /// Check the weights are usable.
    pub fn validate(&self) -> Result<(), CoherenceError> {
        for (name, w) in [
            ("concept", self.concept),
            ("structure", self.structure),
            ("task", self.task),
        ] {
            if !w.is_finite() || w < 0.0 {
                return Err(CoherenceError::InvalidConfig(format!(
                    "score weight '{name}' must be a finite non-negative number, got {w}"
                )));
            }
        }
        if self.total() <= 0.0 {
            return Err(CoherenceError::InvalidConfig(
                "score weights must not all be zero".into(),
            ));
        }
        Ok(())
    }

    fn total(&self) -> f64 {
        self.concept + self.structure + self.task
    }
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            concept: 1.0 / 3.0,
            structure: 1.0 / 3.0,
            task: 1.0 / 3.0,
        }
    }
}

/// A score together with its three sub-scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Concept-overlap sub-score.
    pub concept: f64,
    /// Required-field correspondence sub-score.
    pub structure: f64,
    /// Verb-noun task sub-score.
    pub task: f64,
    /// Weighted, clamped combination.
    pub total: f64,
}

/// Computes coherence scores with a fixed set of weights.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CoherenceScorer {
    weights: ScoreWeights,
}

impl CoherenceScorer {
    /// A scorer with validated weights.
    pub fn new(weights: ScoreWeights) -> Result<Self, CoherenceError> {
        weights.validate()?;
        Ok(Self { weights })
    }

    /// The configured weights.
    pub fn weights(&self) -> ScoreWeights {
        self.weights
    }

    /// Coherence of `target` relative to `source`, in [0, 1].
    pub fn score(&self, source: &Representation, target: &Representation, model: &SemanticModel) -> f64 {
        self.score_detailed(source, target, model).total
    }

    /// Coherence with its sub-scores.
    pub fn score_detailed(
        &self,
        source: &Representation,
        target: &Representation,
        model: &SemanticModel,
    ) -> ScoreBreakdown {
        let concept = concept_overlap(source, target, model);
        let structure = structure_correspondence(source, target, model);
        let task = task_compatibility(source, target, model);

        let w = &self.weights;
        let total = w.total();
        let combined = if total > 0.0 {
            (w.concept * concept + w.structure * structure + w.task * task) / total
        } else {
            0.0
        };
        let breakdown = ScoreBreakdown {
            concept,
            structure,
            task,
            total: combined.clamp(0.0, 1.0),
        };
        tracing::trace!(
            domain = model.domain(),
            concept,
            structure,
            task,
            score = breakdown.total,
            "coherence scored"
        );
        breakdown
    }
}

/// Fraction of the model's required fields that `value` satisfies.
/// 1.0 when the model requires none.
pub fn required_field_ratio(value: &Representation, model: &SemanticModel) -> f64 {
    let fields = model.required_fields();
    if fields.is_empty() {
        return 1.0;
    }
    let satisfied = fields
        .iter()
        .filter(|f| f.is_satisfied_by(&value.payload))
        .count();
    satisfied as f64 / fields.len() as f64
}

fn concept_overlap(source: &Representation, target: &Representation, model: &SemanticModel) -> f64 {
    let a = source.concepts(model);
    let b = target.concepts(model);
    let union = a.union(&b).count();
    if union == 0 {
        return 1.0;
    }
    a.intersection(&b).count() as f64 / union as f64
}

fn structure_correspondence(
    source: &Representation,
    target: &Representation,
    model: &SemanticModel,
) -> f64 {
    let present: Vec<_> = model
        .required_fields()
        .iter()
        .filter(|f| f.is_satisfied_by(&source.payload))
        .collect();
    if present.is_empty() {
        return 1.0;
    }
    let kept = present
        .iter()
        .filter(|f| f.is_satisfied_by(&target.payload))
        .count();
    kept as f64 / present.len() as f64
}

fn task_compatibility(source: &Representation, target: &Representation, model: &SemanticModel) -> f64 {
    match (&source.task, &target.task) {
        (None, None) => 1.0,
        (_, Some(t)) if source.task.as_ref() == Some(t) => 1.0,
        (_, Some(t)) if validate_pair(t, model).is_valid() => 1.0,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use sema_core::{FieldKind, FormatId, VerbNounPair};
    use serde_json::{json, Value};

    fn model() -> SemanticModel {
        SemanticModel::builder("transportation")
            .concepts(["vehicle", "speed", "location"])
            .allow("speeding", "car", "ground")
            .require_field("vehicle", FieldKind::Object)
            .require_field("speed", FieldKind::Number)
            .build()
            .unwrap()
    }

    fn repr(payload: Value) -> Representation {
        Representation::new(FormatId::new("json").unwrap(), payload)
    }

    #[test]
    fn identical_is_perfect() {
        let m = model();
        let x = repr(json!({"vehicle": {}, "speed": 88.0}))
            .with_task(VerbNounPair::new("speeding", "car", "ground"));
        assert_eq!(CoherenceScorer::default().score(&x, &x, &m), 1.0);
    }

    #[test]
    fn invalid_value_still_self_coherent() {
        let m = model();
        let x = repr(json!("garbage")).with_task(VerbNounPair::new("flying", "car", "ground"));
        assert_eq!(CoherenceScorer::default().score(&x, &x, &m), 1.0);
    }

    #[test]
    fn dropped_field_lowers_structure() {
        let m = model();
        let src = repr(json!({"vehicle": {}, "speed": 88.0}));
        let dst = repr(json!({"vehicle": {}}));
        let b = CoherenceScorer::default().score_detailed(&src, &dst, &m);
        assert_eq!(b.structure, 0.5);
        assert_eq!(b.concept, 0.5);
        assert_eq!(b.task, 1.0);
        assert!((b.total - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn invalid_changed_task_scores_zero_task() {
        let m = model();
        let src = repr(json!({})).with_task(VerbNounPair::new("speeding", "car", "ground"));
        let dst = repr(json!({})).with_task(VerbNounPair::new("flying", "car", "ground"));
        let b = CoherenceScorer::default().score_detailed(&src, &dst, &m);
        assert_eq!(b.task, 0.0);
        let dropped = repr(json!({}));
        assert_eq!(CoherenceScorer::default().score_detailed(&src, &dropped, &m).task, 0.0);
    }

    #[test]
    fn weights_shift_emphasis() {
        let m = model();
        let src = repr(json!({"vehicle": {}, "speed": 1}));
        let dst = repr(json!({"vehicle": {}}));
        let structure_only = CoherenceScorer::new(ScoreWeights::new(0.0, 1.0, 0.0).unwrap()).unwrap();
        assert_eq!(structure_only.score(&src, &dst, &m), 0.5);
        let task_only = CoherenceScorer::new(ScoreWeights::new(0.0, 0.0, 2.0).unwrap()).unwrap();
        assert_eq!(task_only.score(&src, &dst, &m), 1.0);
    }

    #[test]
    fn bad_weights_rejected() {
        assert!(ScoreWeights::new(-0.1, 1.0, 1.0).is_err());
        assert!(ScoreWeights::new(0.0, 0.0, 0.0).is_err());
        assert!(ScoreWeights::new(f64::NAN, 1.0, 1.0).is_err());
    }

    #[test]
    fn field_ratio() {
        let m = model();
        assert_eq!(required_field_ratio(&repr(json!({"speed": 3})), &m), 0.5);
        let none = SemanticModel::builder("d").build().unwrap();
        assert_eq!(required_field_ratio(&repr(json!(null)), &none), 1.0);
    }

    fn payload() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            (-1000i64..1000).prop_map(|n| json!(n)),
            prop::sample::select(vec!["vehicle", "speed", "location", "car", "other"])
                .prop_map(|s| json!(s)),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map(
                    prop::sample::select(vec!["vehicle", "speed", "location", "x", "y"]).prop_map(String::from),
                    inner,
                    0..4
                )
                .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn score_is_bounded(a in payload(), b in payload(), w in (0.0f64..5.0, 0.0f64..5.0, 0.01f64..5.0)) {
            let m = model();
            let scorer = CoherenceScorer::new(ScoreWeights::new(w.0, w.1, w.2).unwrap()).unwrap();
            let s = scorer.score(&repr(a), &repr(b), &m);
            prop_assert!((0.0..=1.0).contains(&s));
        }

        #[test]
        fn self_score_is_one(a in payload()) {
            let m = model();
            let x = repr(a);
            prop_assert_eq!(CoherenceScorer::default().score(&x, &x, &m), 1.0);
        }
    }
}
