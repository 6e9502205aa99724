//! Coherence score bounds: self-comparison is perfect and every score lies
//! in [0, 1], for the default and for arbitrary valid weights.

use proptest::prelude::*;
use sema_engine::{
    CoherenceEngine, EngineConfig, FieldKind, FormatId, Representation, ScoreWeights,
    SemanticModel, VerbNounPair,
};
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

fn arb_payload() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        (-1000i64..1000).prop_map(Value::from),
        prop::sample::select(vec!["vehicle", "speed", "location", "other"]).prop_map(Value::from),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop::collection::btree_map(
            prop::sample::select(vec!["vehicle", "speed", "location", "x"]).prop_map(String::from),
            inner,
            0..4,
        )
        .prop_map(|m| Value::Object(m.into_iter().collect()))
    })
}

fn arb_repr() -> impl Strategy<Value = Representation> {
    (arb_payload(), any::<bool>(), any::<bool>()).prop_map(|(payload, has_task, valid)| {
        let r = Representation::new(FormatId::new("json").unwrap(), payload);
        match (has_task, valid) {
            (false, _) => r,
            (true, true) => r.with_task(VerbNounPair::new("speeding", "car", "ground")),
            (true, false) => r.with_task(VerbNounPair::new("flying", "car", "ground")),
        }
    })
}

#[test]
fn identical_values_score_one() {
    let engine = CoherenceEngine::new();
    let h = engine.register_model(model());
    let x = Representation::new(FormatId::new("json").unwrap(), json!({"vehicle": {}, "speed": 3}));
    assert_eq!(engine.compute_coherence(&x, &x, h).unwrap(), 1.0);
}

proptest! {
    #[test]
    fn self_coherence_is_one(x in arb_repr()) {
        let engine = CoherenceEngine::new();
        let h = engine.register_model(model());
        prop_assert_eq!(engine.compute_coherence(&x, &x, h).unwrap(), 1.0);
    }

    #[test]
    fn coherence_is_bounded(
        a in arb_repr(),
        b in arb_repr(),
        concept in 0.0f64..5.0,
        structure in 0.0f64..5.0,
        task in 0.01f64..5.0,
    ) {
        let config = EngineConfig {
            weights: ScoreWeights::new(concept, structure, task).unwrap(),
            ..EngineConfig::default()
        };
        let engine = CoherenceEngine::with_config(config).unwrap();
        let h = engine.register_model(model());
        let s = engine.compute_coherence(&a, &b, h).unwrap();
        prop_assert!((0.0..=1.0).contains(&s), "score {} out of bounds", s);
    }
}
