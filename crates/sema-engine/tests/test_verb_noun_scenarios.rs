//! Closed-world verb-noun validation through the engine surface.
//!
//! A pair is valid exactly when the model declares it, directly or through a
//! wildcard rule. Everything else is rejected, never warned about.

use proptest::prelude::*;
use sema_engine::{
    validate_pair, CoherenceEngine, FormatId, PairRejection, PairVerdict, Representation,
    SemanticModel, VerbNounPair,
};
use serde_json::json;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn transportation() -> SemanticModel {
    SemanticModel::builder("transportation")
        .concepts(["vehicle", "speed"])
        .allow("speeding", "car", "ground")
        .build()
        .unwrap()
}

#[test]
fn declared_pair_is_valid() {
    init_tracing();
    let m = transportation();
    let pair = VerbNounPair::new("speeding", "car", "ground");
    assert_eq!(validate_pair(&pair, &m), PairVerdict::Valid);
}

#[test]
fn flying_car_is_a_domain_mismatch() {
    init_tracing();
    let m = transportation();
    let pair = VerbNounPair::new("flying", "car", "ground");
    match validate_pair(&pair, &m) {
        PairVerdict::Invalid(PairRejection::DomainMismatch { .. }) => {}
        other => panic!("expected DomainMismatch, got {other:?}"),
    }
}

#[test]
fn undeclared_combination_is_rejected() {
    let m = SemanticModel::builder("logistics")
        .allow("loading", "pallet", "warehouse")
        .build()
        .unwrap();
    let pair = VerbNounPair::new("folding", "umbrella", "warehouse");
    assert!(matches!(
        validate_pair(&pair, &m),
        PairVerdict::Invalid(PairRejection::UnknownVerbNounCombination { .. })
    ));
}

#[test]
fn invalid_task_fails_contextual_layer() {
    init_tracing();
    let engine = CoherenceEngine::new();
    let h = engine.register_model(transportation());
    let fmt = FormatId::new("json").unwrap();
    let ok = Representation::new(fmt.clone(), json!({"vehicle": "car"}))
        .with_task(VerbNounPair::new("speeding", "car", "ground"));
    let bad = ok.clone().with_task(VerbNounPair::new("flying", "car", "ground"));
    assert!(engine.validate_semantic_coherence(h, &ok).unwrap());
    assert!(!engine.validate_semantic_coherence(h, &bad).unwrap());
}

const VERBS: &[&str] = &["speeding", "towing", "parking", "flying"];
const NOUNS: &[&str] = &["car", "truck", "bicycle", "plane"];

fn ruled_model(exact: &[(usize, usize)]) -> SemanticModel {
    let mut b = SemanticModel::builder("transportation")
        .category("ground-vehicle", ["car", "truck"])
        .rule("towing", "@ground-vehicle", "ground");
    for &(v, n) in exact {
        b = b.allow(VERBS[v], NOUNS[n], "ground");
    }
    b.build().unwrap()
}

proptest! {
    #[test]
    fn valid_iff_declared_or_subsumed(
        exact in prop::collection::vec((0..VERBS.len(), 0..NOUNS.len()), 0..6),
        v in 0..VERBS.len(),
        n in 0..NOUNS.len(),
    ) {
        let m = ruled_model(&exact);
        let declared = exact.contains(&(v, n));
        let subsumed = VERBS[v] == "towing" && ["car", "truck"].contains(&NOUNS[n]);
        let verdict = validate_pair(&VerbNounPair::new(VERBS[v], NOUNS[n], "ground"), &m);
        prop_assert_eq!(verdict.is_valid(), declared || subsumed);
    }

    #[test]
    fn undeclared_domain_never_valid(v in 0..VERBS.len(), n in 0..NOUNS.len()) {
        let m = ruled_model(&[(0, 0), (1, 1)]);
        let verdict = validate_pair(&VerbNounPair::new(VERBS[v], NOUNS[n], "air"), &m);
        prop_assert!(!verdict.is_valid());
    }
}
