//! Stream processing: each reading is judged independently against the
//! model and the caller's bounds, and a bad reading never stops the stream.

use sema_engine::{
    Checkpoint, CoherenceEngine, CoherenceError, ConstraintLayer, FormatId, Representation,
    SemanticModel, StreamBounds,
};
use serde_json::json;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn engine_with_sensor_model() -> (CoherenceEngine, sema_engine::ModelHandle) {
    let engine = CoherenceEngine::new();
    let h = engine.register_model(
        SemanticModel::builder("environment")
            .concepts(["temperature", "humidity"])
            .build()
            .unwrap(),
    );
    (engine, h)
}

#[test]
fn temperature_range_scenario() {
    init_tracing();
    let (engine, h) = engine_with_sensor_model();
    let p = engine
        .create_stream_processor(h, StreamBounds::new("temperature", -40.0, 85.0).unwrap())
        .unwrap();
    assert!(!p.validate_stream_coherence(90.0));
    assert!(p.validate_stream_coherence(22.5));
}

#[test]
fn out_of_range_reading_is_contextual_violation() {
    let (engine, h) = engine_with_sensor_model();
    let p = engine
        .create_stream_processor(h, StreamBounds::new("temperature", -40.0, 85.0).unwrap())
        .unwrap();
    let r = Representation::new(FormatId::new("reading").unwrap(), json!({"temperature": 90.0}));
    match p.validate_reading(&r).unwrap_err() {
        CoherenceError::ContextualViolation(v) => {
            assert_eq!(v.layer, ConstraintLayer::Contextual);
            assert_eq!(v.checkpoint, Checkpoint::Stream);
        }
        other => panic!("expected ContextualViolation, got {other:?}"),
    }
}

#[test]
fn stream_continues_past_bad_readings() {
    init_tracing();
    let (engine, h) = engine_with_sensor_model();
    let p = engine
        .create_stream_processor(h, StreamBounds::new("temperature", -40.0, 85.0).unwrap())
        .unwrap();
    let readings = [20.0, 90.0, f64::NAN, 21.0, -41.0, 22.0];
    let accepted: Vec<bool> = readings.iter().map(|&r| p.validate_stream_coherence(r)).collect();
    assert_eq!(accepted, vec![true, false, false, true, false, true]);
    assert_eq!(p.accepted(), 3);
    assert_eq!(p.rejected(), 3);
}

#[test]
fn processors_are_shareable_across_threads() {
    let (engine, h) = engine_with_sensor_model();
    let p = engine
        .create_stream_processor(h, StreamBounds::new("humidity", 0.0, 100.0).unwrap())
        .unwrap();
    std::thread::scope(|s| {
        for t in 0..4 {
            let p = &p;
            s.spawn(move || {
                for i in 0..25 {
                    p.validate_stream_coherence(f64::from(t * 25 + i) * 1.1);
                }
            });
        }
    });
    assert_eq!(p.accepted() + p.rejected(), 100);
    // Readings are k * 1.1 for k in 0..100; k <= 90 stays within bounds.
    assert_eq!(p.accepted(), 91);
}

#[test]
fn released_model_cannot_back_new_processors() {
    let (engine, h) = engine_with_sensor_model();
    engine.release_model(h);
    let err = engine
        .create_stream_processor(h, StreamBounds::new("temperature", -40.0, 85.0).unwrap())
        .unwrap_err();
    assert!(matches!(err, CoherenceError::ModelNotFound(_)));
}
