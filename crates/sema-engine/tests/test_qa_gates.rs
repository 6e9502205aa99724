//! QA gate behaviour: per-stage thresholds, monotonicity in the threshold,
//! and staged requests gated at each checkpoint.

use proptest::prelude::*;
use sema_engine::{
    CallbackError, CoherenceEngine, CoherenceError, FieldKind, FormatId, GateDecision, QaStage,
    QaThresholds, Representation, SemanticModel, TransformRequest,
};
use serde_json::json;

fn fmt(tag: &str) -> FormatId {
    FormatId::new(tag).unwrap()
}

fn model() -> SemanticModel {
    SemanticModel::builder("transportation")
        .concepts(["vehicle", "speed", "location"])
        .target(fmt("packed"))
        .require_field("vehicle", FieldKind::Object)
        .build()
        .unwrap()
}

/// Keeps the vehicle but forgets where it was.
fn drop_location(v: &Representation, target: &FormatId) -> Result<Representation, CallbackError> {
    let mut out = v.clone();
    out.format = target.clone();
    if let Some(obj) = out.payload.as_object_mut() {
        obj.remove("location");
    }
    Ok(out)
}

fn input() -> Representation {
    Representation::new(fmt("json"), json!({"vehicle": {}, "speed": 10, "location": "depot"}))
}

#[test]
fn default_thresholds_are_ordered() {
    let t = QaThresholds::default();
    assert_eq!(t.get(QaStage::Intake), 0.5);
    assert_eq!(t.get(QaStage::Processing), 0.7);
    assert_eq!(t.get(QaStage::Completion), 0.9);
    assert!(t.is_monotonic());
}

#[test]
fn ordering_is_not_enforced() {
    let engine = CoherenceEngine::new();
    engine.set_qa_threshold(QaStage::Intake, 0.95).unwrap();
    assert!(!engine.qa_thresholds().is_monotonic());
    assert_eq!(engine.gate(QaStage::Intake, 0.9), GateDecision::Fail);
}

#[test]
fn staged_request_gated_on_forward_score() {
    let engine = CoherenceEngine::new();
    let h = engine.register_model(model());

    // Dropping one of three concepts scores 2/3 on that term, 0.889 overall.
    let unstaged = TransformRequest::new(input(), fmt("packed"), &drop_location);
    let out = engine.execute(h, unstaged).unwrap();
    assert!(out.forward_score < 0.9 && out.forward_score > 0.7);

    let staged = TransformRequest::new(input(), fmt("packed"), &drop_location).staged();
    let err = engine.execute(h, staged).unwrap_err();
    match err {
        CoherenceError::QaGateRejected { stage, threshold, .. } => {
            assert_eq!(stage, QaStage::Completion);
            assert_eq!(threshold, 0.9);
        }
        other => panic!("expected QaGateRejected, got {other:?}"),
    }

    engine.set_qa_threshold(QaStage::Completion, 0.85).unwrap();
    let staged = TransformRequest::new(input(), fmt("packed"), &drop_location).staged();
    assert!(engine.execute(h, staged).is_ok());
}

#[test]
fn invalid_thresholds_rejected() {
    let engine = CoherenceEngine::new();
    for bad in [-0.01, 1.01, f64::NAN, f64::INFINITY] {
        assert!(matches!(
            engine.set_qa_threshold(QaStage::Processing, bad),
            Err(CoherenceError::InvalidThreshold(_))
        ));
    }
}

fn stage() -> impl Strategy<Value = QaStage> {
    prop_oneof![
        Just(QaStage::Intake),
        Just(QaStage::Processing),
        Just(QaStage::Completion),
    ]
}

proptest! {
    #[test]
    fn lower_threshold_never_rejects_what_higher_passes(
        s in 0.0f64..=1.0,
        a in 0.0f64..=1.0,
        b in 0.0f64..=1.0,
        stage in stage(),
    ) {
        let (t1, t2) = if a <= b { (a, b) } else { (b, a) };
        let engine = CoherenceEngine::new();
        engine.set_qa_threshold(stage, t2).unwrap();
        let high = engine.gate(stage, s);
        engine.set_qa_threshold(stage, t1).unwrap();
        let low = engine.gate(stage, s);
        if high == GateDecision::Pass {
            prop_assert_eq!(low, GateDecision::Pass);
        }
    }
}
