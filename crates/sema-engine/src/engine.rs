//! # Coherence Engine
//!
//! The scoped handle callers hold: a model registry, the QA thresholds in
//! force, and the configured pipeline and corrector. Everything a call
//! needs besides that is created per call and dropped when it returns.
//!
//! ## Concurrency
//!
//! `CoherenceEngine` is `Send + Sync`. Model lookups and threshold reads
//! take shared locks; registration and threshold updates serialize behind
//! the corresponding write lock. Models are immutable once registered, so a
//! call that resolved a model keeps a consistent view of it even if the
//! handle is released meanwhile.

use std::sync::Arc;

use parking_lot::RwLock;

use sema_core::{
    Checkpoint, CoherenceError, ConstraintSet, FormatId, ModelHandle, ModelRegistry, QaStage,
    RegisteredModel, RegistryId, Representation, SemanticModel,
};
use sema_fault::{CorrectedValue, Corrector, FaultToleranceConfig, RedundancySet};
use sema_pipeline::{
    check_equivalence, AuditSink, CoherenceContext, ForwardFn, GateDecision, Pipeline,
    QaThresholds, ReverseFn, TransformOutcome, TransformRequest,
};
use sema_validate::{standard_constraints, validate, CoherenceScorer, ValidationMode, ValidationReport};

use crate::config::EngineConfig;
use crate::stream::{StreamBounds, StreamProcessor};

/// Caller-facing coherence engine.
#[derive(Debug)]
pub struct CoherenceEngine {
    registry: ModelRegistry,
    thresholds: RwLock<QaThresholds>,
    pipeline: Pipeline,
    corrector: Corrector,
    config: EngineConfig,
}

impl CoherenceEngine {
    /// An engine with the default configuration.
    pub fn new() -> Self {
        let config = EngineConfig::default();
        let scorer = CoherenceScorer::default();
        Self {
            registry: ModelRegistry::new(),
            thresholds: RwLock::new(config.qa_thresholds),
            pipeline: Pipeline::new(scorer).with_mode(config.validation_mode),
            corrector: Corrector::new(scorer),
            config,
        }
    }

    /// An engine with a validated configuration.
    pub fn with_config(config: EngineConfig) -> Result<Self, CoherenceError> {
        config.validate()?;
        let scorer = CoherenceScorer::new(config.weights)?;
        let pipeline = Pipeline::new(scorer)
            .with_round_trip_threshold(config.round_trip_threshold)?
            .with_mode(config.validation_mode);
        Ok(Self {
            registry: ModelRegistry::new(),
            thresholds: RwLock::new(config.qa_thresholds),
            pipeline,
            corrector: Corrector::new(scorer),
            config,
        })
    }

    /// Deliver a record of every transformation to `sink`.
    pub fn with_audit(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.pipeline = self.pipeline.with_audit(sink);
        self
    }

    /// Identity of this engine's registry; every handle it mints carries it.
    pub fn id(&self) -> RegistryId {
        self.registry.id()
    }

    /// The configuration the engine was built with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Release every held model and consume the engine. Returns how many
    /// models were released.
    pub fn destroy(self) -> usize {
        let released = self.registry.clear();
        tracing::info!(registry = %self.registry.id(), released, "coherence engine destroyed");
        released
    }

    // ─── Models ──────────────────────────────────────────────────────

    /// Register `model` with the constraints derived from it.
    pub fn register_model(&self, model: SemanticModel) -> ModelHandle {
        self.registry.register(model, standard_constraints())
    }

    /// Register `model` with caller-supplied constraints.
    pub fn register_model_with(&self, model: SemanticModel, constraints: ConstraintSet) -> ModelHandle {
        self.registry.register(model, constraints)
    }

    /// Resolve a handle.
    pub fn model(&self, handle: ModelHandle) -> Result<Arc<RegisteredModel>, CoherenceError> {
        self.registry.lookup(handle)
    }

    /// Drop a model. Returns whether it was registered.
    pub fn release_model(&self, handle: ModelHandle) -> bool {
        self.registry.release(handle)
    }

    /// Number of registered models.
    pub fn model_count(&self) -> usize {
        self.registry.len()
    }

    // ─── Transformations ─────────────────────────────────────────────

    /// Transform `input` into `target`, validating both sides and, when
    /// `reverse` is supplied, the round trip.
    pub fn transform_with_coherence<'f>(
        &self,
        handle: ModelHandle,
        input: Representation,
        target: FormatId,
        forward: &'f ForwardFn<'f>,
        reverse: Option<&'f ReverseFn<'f>>,
    ) -> Result<TransformOutcome, CoherenceError> {
        let mut request = TransformRequest::new(input, target, forward);
        if let Some(reverse) = reverse {
            request = request.with_reverse(reverse);
        }
        self.execute(handle, request)
    }

    /// Run a fully specified request. Staged requests are gated by the
    /// engine's current QA thresholds.
    pub fn execute(
        &self,
        handle: ModelHandle,
        request: TransformRequest<'_>,
    ) -> Result<TransformOutcome, CoherenceError> {
        let entry = self.registry.lookup(handle)?;
        let thresholds = *self.thresholds.read();
        self.pipeline
            .execute(entry.model(), entry.constraints(), request, &thresholds)
    }

    // ─── Validation ──────────────────────────────────────────────────

    /// Whether `value` passes every constraint layer of the model.
    ///
    /// # Errors
    ///
    /// `ModelNotFound`, or `InternalCallbackFailure` from a panicking predicate.
    pub fn validate_semantic_coherence(
        &self,
        handle: ModelHandle,
        value: &Representation,
    ) -> Result<bool, CoherenceError> {
        let entry = self.registry.lookup(handle)?;
        let report = validate(
            entry.constraints(),
            value,
            entry.model(),
            ValidationMode::FastPath,
            Checkpoint::InputValidation,
        )?;
        Ok(report.passed())
    }

    /// Every failing predicate of every layer, for diagnostics.
    pub fn diagnose(
        &self,
        handle: ModelHandle,
        value: &Representation,
    ) -> Result<ValidationReport, CoherenceError> {
        let entry = self.registry.lookup(handle)?;
        validate(
            entry.constraints(),
            value,
            entry.model(),
            ValidationMode::FullReport,
            Checkpoint::InputValidation,
        )
    }

    /// Whether `output` is an equivalent reconstruction of `input`: both
    /// pass every layer, the score meets the round-trip threshold, and the
    /// task and payload are unchanged.
    pub fn validate_bidirectional_integrity(
        &self,
        handle: ModelHandle,
        input: &Representation,
        output: &Representation,
    ) -> Result<bool, CoherenceError> {
        let entry = self.registry.lookup(handle)?;
        let mut ctx = CoherenceContext::new(entry.model(), entry.constraints(), self.pipeline.mode());
        if !ctx.check(input, Checkpoint::InputValidation)?.passed() {
            return Ok(false);
        }
        match check_equivalence(
            &mut ctx,
            input,
            output,
            self.pipeline.scorer(),
            self.pipeline.round_trip_threshold(),
        ) {
            Ok(_) => Ok(true),
            Err(CoherenceError::CoherenceLost { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Coherence of `target` relative to `source` under the model, in [0, 1].
    pub fn compute_coherence(
        &self,
        source: &Representation,
        target: &Representation,
        handle: ModelHandle,
    ) -> Result<f64, CoherenceError> {
        let entry = self.registry.lookup(handle)?;
        let score = self.pipeline.scorer().score(source, target, entry.model());
        tracing::debug!(domain = entry.model().domain(), score, "coherence computed");
        Ok(score)
    }

    // ─── QA gates ────────────────────────────────────────────────────

    /// Replace the threshold for `stage`.
    ///
    /// # Errors
    ///
    /// `InvalidThreshold` if `threshold` is outside [0, 1].
    pub fn set_qa_threshold(&self, stage: QaStage, threshold: f64) -> Result<(), CoherenceError> {
        let mut thresholds = self.thresholds.write();
        thresholds.set(stage, threshold)?;
        if !thresholds.is_monotonic() {
            tracing::debug!(%stage, threshold, "QA thresholds are no longer monotonic");
        }
        tracing::info!(%stage, threshold, "QA threshold updated");
        Ok(())
    }

    /// Snapshot of the current thresholds.
    pub fn qa_thresholds(&self) -> QaThresholds {
        *self.thresholds.read()
    }

    /// Compare `score` against the current threshold for `stage`.
    pub fn gate(&self, stage: QaStage, score: f64) -> GateDecision {
        self.thresholds.read().gate(stage, score)
    }

    // ─── Streams and correction ──────────────────────────────────────

    /// A processor validating readings against the model and `bounds`.
    pub fn create_stream_processor(
        &self,
        handle: ModelHandle,
        bounds: StreamBounds,
    ) -> Result<StreamProcessor, CoherenceError> {
        StreamProcessor::new(self.registry.lookup(handle)?, bounds)
    }

    /// Recover the value the majority of `set` agrees on.
    pub fn correct(
        &self,
        set: &RedundancySet,
        config: &FaultToleranceConfig,
        handle: ModelHandle,
    ) -> Result<CorrectedValue, CoherenceError> {
        let entry = self.registry.lookup(handle)?;
        self.corrector
            .correct(set, config, entry.model(), entry.constraints())
    }

    /// [`correct`](Self::correct) with the engine's configured fault tolerance.
    pub fn correct_with_defaults(
        &self,
        set: &RedundancySet,
        handle: ModelHandle,
    ) -> Result<CorrectedValue, CoherenceError> {
        let config = self.config.fault_tolerance;
        self.correct(set, &config, handle)
    }
}

impl Default for CoherenceEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sema_core::{FieldKind, VerbNounPair};
    use sema_pipeline::{AuditTrail, CallbackError};
    use serde_json::json;

    fn fmt(tag: &str) -> FormatId {
        FormatId::new(tag).unwrap()
    }

    fn model() -> SemanticModel {
        SemanticModel::builder("transportation")
            .concepts(["vehicle", "speed"])
            .target(fmt("packed"))
            .allow("speeding", "car", "ground")
            .allow("parking", "car", "ground")
            .require_field("vehicle.wheels", FieldKind::Integer)
            .build()
            .unwrap()
    }

    fn input() -> Representation {
        Representation::new(fmt("json"), json!({"vehicle": {"wheels": 4}, "speed": 88}))
            .with_task(VerbNounPair::new("speeding", "car", "ground"))
    }

    fn retag(v: &Representation, f: &FormatId) -> Result<Representation, CallbackError> {
        let mut out = v.clone();
        out.format = f.clone();
        Ok(out)
    }

    fn back(v: &Representation) -> Result<Representation, CallbackError> {
        retag(v, &fmt("json"))
    }

    #[test]
    fn transform_records_to_audit_sink() {
        let trail = Arc::new(AuditTrail::new());
        let engine = CoherenceEngine::new().with_audit(trail.clone());
        let h = engine.register_model(model());
        let out = engine
            .transform_with_coherence(h, input(), fmt("packed"), &retag, Some(&back))
            .unwrap();
        assert_eq!(out.score, 1.0);
        assert_eq!(trail.len(), 1);
        assert!(trail.last().unwrap().succeeded());
    }

    #[test]
    fn released_and_foreign_handles_not_found() {
        let a = CoherenceEngine::new();
        let b = CoherenceEngine::new();
        let h = a.register_model(model());
        assert!(matches!(
            b.validate_semantic_coherence(h, &input()),
            Err(CoherenceError::ModelNotFound(_))
        ));
        assert!(a.release_model(h));
        assert!(matches!(
            a.compute_coherence(&input(), &input(), h),
            Err(CoherenceError::ModelNotFound(_))
        ));
    }

    #[test]
    fn destroy_releases_models() {
        let engine = CoherenceEngine::new();
        engine.register_model(model());
        engine.register_model(model());
        assert_eq!(engine.model_count(), 2);
        assert_eq!(engine.destroy(), 2);
    }

    #[test]
    fn bidirectional_integrity() {
        let engine = CoherenceEngine::new();
        let h = engine.register_model(model());
        let same = retag(&input(), &fmt("packed")).unwrap();
        assert!(engine.validate_bidirectional_integrity(h, &input(), &same).unwrap());

        let mut changed = same.clone();
        changed.payload["vehicle"]["wheels"] = json!(3);
        assert!(!engine.validate_bidirectional_integrity(h, &input(), &changed).unwrap());

        let broken = Representation::new(fmt("json"), json!({"speed": 88}));
        assert!(!engine.validate_bidirectional_integrity(h, &broken, &same).unwrap());

        let mut drifted = same.clone();
        drifted.payload["vehicle"]["plate"] = json!("ZZ-999");
        drifted.payload["speed"] = json!(5);
        assert_eq!(engine.compute_coherence(&input(), &drifted, h).unwrap(), 1.0);
        assert!(!engine.validate_bidirectional_integrity(h, &input(), &drifted).unwrap());

        let retasked = same.clone().with_task(VerbNounPair::new("parking", "car", "ground"));
        assert!(engine.validate_semantic_coherence(h, &retasked).unwrap());
        assert!(!engine.validate_bidirectional_integrity(h, &input(), &retasked).unwrap());
    }

    #[test]
    fn semantic_coherence_and_diagnosis() {
        let engine = CoherenceEngine::new();
        let h = engine.register_model(model());
        assert!(engine.validate_semantic_coherence(h, &input()).unwrap());
        let bad = Representation::new(fmt("json"), json!({"colour": "red"}))
            .with_task(VerbNounPair::new("flying", "car", "ground"));
        assert!(!engine.validate_semantic_coherence(h, &bad).unwrap());
        let report = engine.diagnose(h, &bad).unwrap();
        let failed: Vec<_> = report.layers.iter().flat_map(|l| l.failed.iter()).collect();
        assert_eq!(failed.len(), 3);
    }

    #[test]
    fn thresholds_are_adjustable() {
        let engine = CoherenceEngine::new();
        assert_eq!(engine.gate(QaStage::Completion, 0.85), GateDecision::Fail);
        engine.set_qa_threshold(QaStage::Completion, 0.8).unwrap();
        assert_eq!(engine.gate(QaStage::Completion, 0.85), GateDecision::Pass);
        assert!(matches!(
            engine.set_qa_threshold(QaStage::Intake, 1.01),
            Err(CoherenceError::InvalidThreshold(_))
        ));
        assert_eq!(engine.qa_thresholds().get(QaStage::Intake), 0.5);
    }

    #[test]
    fn configured_engine_uses_its_settings() {
        let config = EngineConfig::from_yaml_str("round_trip_threshold: 0.5\nvalidation_mode: full_report\n").unwrap();
        let engine = CoherenceEngine::with_config(config).unwrap();
        assert_eq!(engine.config().round_trip_threshold, 0.5);
        let bad = EngineConfig {
            round_trip_threshold: 2.0,
            ..EngineConfig::default()
        };
        assert!(CoherenceEngine::with_config(bad).is_err());
    }

    #[test]
    fn concurrent_calls_share_one_engine() {
        let engine = CoherenceEngine::new();
        let h = engine.register_model(model());
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..16 {
                        let out = engine
                            .transform_with_coherence(h, input(), fmt("packed"), &retag, Some(&back))
                            .unwrap();
                        assert_eq!(out.score, 1.0);
                    }
                });
            }
            s.spawn(|| {
                engine.register_model(model());
            });
        });
        assert_eq!(engine.model_count(), 2);
    }
}
