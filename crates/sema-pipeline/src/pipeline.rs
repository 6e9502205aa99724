//! # Bidirectional Transform Pipeline
//!
//! Orchestrates one coherence-checked transformation using the typestate
//! pattern. Each phase is a distinct type, so a transform cannot run on an
//! unvalidated input and an output cannot be reported before it is checked.
//!
//! ## Phases
//!
//! ```text
//! Run<Idle> ──validate_input()──▶ Run<InputValidated> ──transform()──▶ Run<Transformed>
//!                                                                           │
//!                                                               validate_output()
//!                                                                           ▼
//!                                Run<Done> ◀──complete(reverse?)── Run<OutputValidated>
//! ```
//!
//! Every phase change is mirrored in the run's [`CoherenceContext`]. The
//! first failing check ends the run with `Rejected`; nothing is retried.
//!
//! ## Round Trip
//!
//! With a reverse transform and [`ValidationStrength::Bidirectional`], the
//! reconstruction must pass every layer, score at least the round-trip
//! threshold against the original, and reproduce every required field value
//! the original carried. Any miss is `CoherenceLost`, distinct from an
//! output violation: the forward step looked valid but meaning was lost.

use std::marker::PhantomData;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use sema_core::{
    guarded, Checkpoint, CoherenceError, ConstraintLayer, ConstraintSet, FormatId, OutcomeKind,
    QaStage, Representation, SemanticModel, Violation,
};
use sema_validate::{required_field_ratio, CoherenceScorer, ValidationMode};

use crate::context::{CoherenceContext, PipelineState};
use crate::gate::QaThresholds;
use crate::record::{AuditSink, TransformationRecord};

/// Error type caller transforms may return.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

/// Forward transform: `(input, target_format) -> output`.
pub type ForwardFn<'f> = dyn Fn(&Representation, &FormatId) -> Result<Representation, CallbackError> + 'f;

/// Reverse transform: `output -> reconstructed input`.
pub type ReverseFn<'f> = dyn Fn(&Representation) -> Result<Representation, CallbackError> + 'f;

/// Failure tag when the requested target is not allowed by the model.
pub const TARGET_FORMAT_NOT_ALLOWED: &str = "target_format_not_allowed";
/// Failure tag when the transform produced a different format than requested.
pub const OUTPUT_FORMAT_MISMATCH: &str = "output_format_mismatch";

// ─── Phase types ─────────────────────────────────────────────────────

/// Phase: nothing checked yet.
#[derive(Debug, Clone, Copy)]
pub struct Idle;

/// Phase: input passed every layer.
#[derive(Debug, Clone, Copy)]
pub struct InputValidated;

/// Phase: the forward transform produced an output.
#[derive(Debug, Clone, Copy)]
pub struct Transformed;

/// Phase: the output passed every layer and was scored.
#[derive(Debug, Clone, Copy)]
pub struct OutputValidated;

/// Phase: every check passed (terminal).
#[derive(Debug, Clone, Copy)]
pub struct Done;

mod private {
    pub trait Sealed {}
    impl Sealed for super::Idle {}
    impl Sealed for super::InputValidated {}
    impl Sealed for super::Transformed {}
    impl Sealed for super::OutputValidated {}
    impl Sealed for super::Done {}
}

/// Marker trait for pipeline phases. Sealed.
pub trait Phase: private::Sealed + std::fmt::Debug {
    /// The runtime state this phase corresponds to on entry.
    fn state() -> PipelineState;
}

impl Phase for Idle {
    fn state() -> PipelineState {
        PipelineState::Idle
    }
}
impl Phase for InputValidated {
    fn state() -> PipelineState {
        PipelineState::ValidatingInput
    }
}
impl Phase for Transformed {
    fn state() -> PipelineState {
        PipelineState::Transforming
    }
}
impl Phase for OutputValidated {
    fn state() -> PipelineState {
        PipelineState::ValidatingOutput
    }
}
impl Phase for Done {
    fn state() -> PipelineState {
        PipelineState::Done
    }
}

// ─── Run ─────────────────────────────────────────────────────────────

/// One pipeline run, parameterized by its phase.
#[derive(Debug)]
pub struct Run<'c, 'm, P: Phase> {
    ctx: &'c mut CoherenceContext<'m>,
    input: Representation,
    output: Option<Representation>,
    _phase: PhantomData<P>,
}

impl<'c, 'm, P: Phase> Run<'c, 'm, P> {
    /// The input being transformed.
    pub fn input(&self) -> &Representation {
        &self.input
    }

    /// The run's context.
    pub fn context(&self) -> &CoherenceContext<'m> {
        &*self.ctx
    }

    /// The runtime state matching this phase.
    pub fn phase(&self) -> PipelineState {
        P::state()
    }

    fn into_phase<Q: Phase>(self) -> Run<'c, 'm, Q> {
        Run {
            ctx: self.ctx,
            input: self.input,
            output: self.output,
            _phase: PhantomData,
        }
    }
}

impl<'c, 'm> Run<'c, 'm, Idle> {
    /// Start a run over `input`.
    pub fn new(ctx: &'c mut CoherenceContext<'m>, input: Representation) -> Self {
        Self {
            ctx,
            input,
            output: None,
            _phase: PhantomData,
        }
    }

    /// Run every layer against the input, then gate Intake on its
    /// required-field ratio when thresholds are supplied.
    pub fn validate_input(
        self,
        thresholds: Option<&QaThresholds>,
    ) -> Result<Run<'c, 'm, InputValidated>, CoherenceError> {
        self.ctx.advance(PipelineState::ValidatingInput)?;
        let report = self.ctx.check(&self.input, Checkpoint::InputValidation)?;
        report.into_result(Checkpoint::InputValidation)?;
        let ratio = required_field_ratio(&self.input, self.ctx.model());
        self.ctx.gate(thresholds, QaStage::Intake, ratio)?;
        Ok(self.into_phase())
    }
}

impl<'c, 'm> Run<'c, 'm, InputValidated> {
    /// Invoke the caller's forward transform toward `target`.
    pub fn transform(
        mut self,
        target: &FormatId,
        forward: &ForwardFn<'_>,
    ) -> Result<Run<'c, 'm, Transformed>, CoherenceError> {
        self.ctx.advance(PipelineState::Transforming)?;
        if !self.ctx.model().allows_target(target) {
            return Err(CoherenceError::violation(Violation::new(
                Checkpoint::Transform,
                ConstraintLayer::Contextual,
                TARGET_FORMAT_NOT_ALLOWED,
            )));
        }

        let output = invoke(Checkpoint::Transform, "forward_transform", || {
            forward(&self.input, target)
        })?;
        if &output.format != target {
            return Err(CoherenceError::violation(Violation::new(
                Checkpoint::Transform,
                ConstraintLayer::Structural,
                OUTPUT_FORMAT_MISMATCH,
            )));
        }
        self.output = Some(output);
        Ok(self.into_phase())
    }
}

impl<'c, 'm> Run<'c, 'm, Transformed> {
    /// The output produced by the forward transform.
    pub fn output(&self) -> Option<&Representation> {
        self.output.as_ref()
    }

    /// Score the output against the input, run every layer against it, then
    /// gate Processing on the forward score.
    pub fn validate_output(
        self,
        scorer: &CoherenceScorer,
        thresholds: Option<&QaThresholds>,
    ) -> Result<Run<'c, 'm, OutputValidated>, CoherenceError> {
        self.ctx.advance(PipelineState::ValidatingOutput)?;
        let output = self.output.as_ref().ok_or_else(missing_output)?;
        let score = scorer.score(&self.input, output, self.ctx.model());
        self.ctx.set_forward_score(score);

        let report = self.ctx.check(output, Checkpoint::OutputValidation)?;
        if let Some(v) = report.to_violation(Checkpoint::OutputValidation) {
            return Err(CoherenceError::violation(v.with_score(score)));
        }
        self.ctx.gate(thresholds, QaStage::Processing, score)?;
        Ok(self.into_phase())
    }
}

impl<'c, 'm> Run<'c, 'm, OutputValidated> {
    /// Coherence of the output relative to the input.
    pub fn forward_score(&self) -> f64 {
        self.ctx.forward_score().unwrap_or(0.0)
    }

    /// Optionally round-trip through `reverse`, then gate Completion on the
    /// final score.
    pub fn complete(
        self,
        reverse: Option<&ReverseFn<'_>>,
        scorer: &CoherenceScorer,
        round_trip_threshold: f64,
        thresholds: Option<&QaThresholds>,
    ) -> Result<Run<'c, 'm, Done>, CoherenceError> {
        if let Some(reverse) = reverse {
            self.ctx.advance(PipelineState::ReverseValidating)?;
            let output = self.output.as_ref().ok_or_else(missing_output)?;
            let reconstructed = invoke(Checkpoint::ReverseValidation, "reverse_transform", || {
                reverse(output)
            })?;
            check_equivalence(
                self.ctx,
                &self.input,
                &reconstructed,
                scorer,
                round_trip_threshold,
            )?;
        }

        let final_score = self.ctx.final_score().unwrap_or(0.0);
        self.ctx.gate(thresholds, QaStage::Completion, final_score)?;
        self.ctx.advance(PipelineState::Done)?;
        Ok(self.into_phase())
    }
}

impl<'c, 'm> Run<'c, 'm, Done> {
    /// Final score: the minimum of the forward and round-trip scores.
    pub fn score(&self) -> f64 {
        self.ctx.final_score().unwrap_or(0.0)
    }

    /// Consume the run, yielding the output and its scores.
    pub fn finish(self) -> Result<TransformOutcome, CoherenceError> {
        let output = self.output.ok_or_else(missing_output)?;
        Ok(TransformOutcome {
            output,
            score: self.ctx.final_score().unwrap_or(0.0),
            forward_score: self.ctx.forward_score().unwrap_or(0.0),
            round_trip_score: self.ctx.round_trip_score(),
            record: None,
        })
    }
}

fn missing_output() -> CoherenceError {
    CoherenceError::InvalidConfig("pipeline phase reached without an output".into())
}

fn invoke<F>(checkpoint: Checkpoint, name: &str, f: F) -> Result<Representation, CoherenceError>
where
    F: FnOnce() -> Result<Representation, CallbackError>,
{
    guarded(checkpoint, name, f)?.map_err(|e| {
        tracing::warn!(%checkpoint, callback = name, error = %e, "caller transform failed");
        CoherenceError::InternalCallbackFailure {
            checkpoint,
            callback: name.to_string(),
            message: e.to_string(),
        }
    })
}

/// Check that `reconstructed` is equivalent to `original` under the
/// context's model: every layer passes, the score reaches `threshold`, the
/// task is unchanged, and the payload is reproduced exactly (compared by
/// canonical digest, so key order does not matter). The format may differ.
///
/// Returns the round-trip score. Divergence is `CoherenceLost`.
pub fn check_equivalence(
    ctx: &mut CoherenceContext<'_>,
    original: &Representation,
    reconstructed: &Representation,
    scorer: &CoherenceScorer,
    threshold: f64,
) -> Result<f64, CoherenceError> {
    let model = ctx.model();
    let score = scorer.score(original, reconstructed, model);
    ctx.set_round_trip_score(score);

    let report = ctx.check(reconstructed, Checkpoint::ReverseValidation)?;
    if let Some((layer, tag)) = report.first_failure() {
        return Err(coherence_lost(
            score,
            format!("reconstruction failed {layer} check '{tag}'"),
        ));
    }
    if score < threshold {
        return Err(coherence_lost(
            score,
            format!("round-trip score below threshold {threshold:.3}"),
        ));
    }
    for field in model.required_fields() {
        if let Some(expected) = field.lookup(&original.payload) {
            if field.lookup(&reconstructed.payload) != Some(expected) {
                return Err(coherence_lost(
                    score,
                    format!("required field '{}' changed on round trip", field.path),
                ));
            }
        }
    }
    if reconstructed.task != original.task {
        return Err(coherence_lost(score, "task changed on round trip".into()));
    }
    if reconstructed.payload_digest()? != original.payload_digest()? {
        return Err(coherence_lost(score, "payload changed on round trip".into()));
    }
    Ok(score)
}

fn coherence_lost(score: f64, reason: String) -> CoherenceError {
    tracing::warn!(score, %reason, "coherence lost on round trip");
    CoherenceError::CoherenceLost { score, reason }
}

// ─── Request / outcome ───────────────────────────────────────────────

/// Whether a supplied reverse transform is exercised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStrength {
    /// Validate input and output only.
    Forward,
    /// Also round-trip through the reverse transform, when one is supplied.
    #[default]
    Bidirectional,
}

/// One transformation to run.
pub struct TransformRequest<'f> {
    input: Representation,
    target: FormatId,
    forward: &'f ForwardFn<'f>,
    reverse: Option<&'f ReverseFn<'f>>,
    strength: ValidationStrength,
    staged: bool,
    mode: Option<ValidationMode>,
}

impl<'f> TransformRequest<'f> {
    /// A forward-only, unstaged request.
    pub fn new(input: Representation, target: FormatId, forward: &'f ForwardFn<'f>) -> Self {
        Self {
            input,
            target,
            forward,
            reverse: None,
            strength: ValidationStrength::default(),
            staged: false,
            mode: None,
        }
    }

    /// Supply a reverse transform for round-trip validation.
    pub fn with_reverse(mut self, reverse: &'f ReverseFn<'f>) -> Self {
        self.reverse = Some(reverse);
        self
    }

    /// Choose whether the reverse transform is exercised.
    pub fn strength(mut self, strength: ValidationStrength) -> Self {
        self.strength = strength;
        self
    }

    /// Gate each checkpoint with the QA thresholds.
    pub fn staged(mut self) -> Self {
        self.staged = true;
        self
    }

    /// Override the pipeline's default validation mode.
    pub fn mode(mut self, mode: ValidationMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// The input value.
    pub fn input(&self) -> &Representation {
        &self.input
    }

    /// The requested target format.
    pub fn target(&self) -> &FormatId {
        &self.target
    }

    fn active_reverse(&self) -> Option<&'f ReverseFn<'f>> {
        match self.strength {
            ValidationStrength::Bidirectional => self.reverse,
            ValidationStrength::Forward => None,
        }
    }
}

impl std::fmt::Debug for TransformRequest<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformRequest")
            .field("input", &self.input)
            .field("target", &self.target)
            .field("reverse", &self.reverse.is_some())
            .field("strength", &self.strength)
            .field("staged", &self.staged)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

/// A successful transformation.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformOutcome {
    /// The validated output.
    pub output: Representation,
    /// Final score (minimum of forward and round-trip).
    pub score: f64,
    /// Coherence of the output relative to the input.
    pub forward_score: f64,
    /// Coherence of the reconstruction relative to the input, if round-tripped.
    pub round_trip_score: Option<f64>,
    /// The audit record of the run.
    pub record: Option<TransformationRecord>,
}

// ─── Pipeline ────────────────────────────────────────────────────────

/// Runs transformation requests against a model.
///
/// Holds only immutable configuration; one `Pipeline` serves any number of
/// concurrent calls, each with its own context.
#[derive(Clone)]
pub struct Pipeline {
    scorer: CoherenceScorer,
    round_trip_threshold: f64,
    mode: ValidationMode,
    audit: Option<Arc<dyn AuditSink>>,
}

impl Pipeline {
    /// A pipeline with a strict (1.0) round-trip threshold and fast-path validation.
    pub fn new(scorer: CoherenceScorer) -> Self {
        Self {
            scorer,
            round_trip_threshold: 1.0,
            mode: ValidationMode::FastPath,
            audit: None,
        }
    }

    /// Minimum round-trip score, in [0, 1].
    pub fn with_round_trip_threshold(mut self, threshold: f64) -> Result<Self, CoherenceError> {
        if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
            return Err(CoherenceError::InvalidThreshold(threshold));
        }
        self.round_trip_threshold = threshold;
        Ok(self)
    }

    /// Default validation mode for requests that do not override it.
    pub fn with_mode(mut self, mode: ValidationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Deliver a record of every run to `sink`.
    pub fn with_audit(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    /// The scorer.
    pub fn scorer(&self) -> &CoherenceScorer {
        &self.scorer
    }

    /// The round-trip threshold.
    pub fn round_trip_threshold(&self) -> f64 {
        self.round_trip_threshold
    }

    /// The default validation mode.
    pub fn mode(&self) -> ValidationMode {
        self.mode
    }

    /// Run `request` to completion.
    ///
    /// `thresholds` are consulted only for staged requests. A record of the
    /// run, successful or not, goes to the audit sink.
    pub fn execute(
        &self,
        model: &SemanticModel,
        constraints: &ConstraintSet,
        request: TransformRequest<'_>,
        thresholds: &QaThresholds,
    ) -> Result<TransformOutcome, CoherenceError> {
        let mode = request.mode.unwrap_or(self.mode);
        let mut ctx = CoherenceContext::new(model, constraints, mode);
        let gates = request.staged.then_some(thresholds);
        let input_format = request.input.format.clone();
        let target = request.target.clone();

        let result = self.drive(&mut ctx, &request, gates);

        let (outcome, failure) = match &result {
            Ok(_) => (OutcomeKind::Success, None),
            Err(e) => {
                ctx.reject();
                tracing::warn!(
                    domain = model.domain(),
                    target = %target,
                    outcome = %e.kind(),
                    error = %e,
                    "transformation rejected"
                );
                (e.kind(), Some(e.to_string()))
            }
        };
        let record = TransformationRecord::capture(&ctx, input_format, target, outcome, failure);
        if let Some(sink) = &self.audit {
            sink.record(&record);
        }

        result.map(|mut outcome| {
            tracing::debug!(
                domain = model.domain(),
                score = outcome.score,
                "transformation succeeded"
            );
            outcome.record = Some(record);
            outcome
        })
    }

    fn drive(
        &self,
        ctx: &mut CoherenceContext<'_>,
        request: &TransformRequest<'_>,
        gates: Option<&QaThresholds>,
    ) -> Result<TransformOutcome, CoherenceError> {
        Run::new(ctx, request.input.clone())
            .validate_input(gates)?
            .transform(&request.target, request.forward)?
            .validate_output(&self.scorer, gates)?
            .complete(
                request.active_reverse(),
                &self.scorer,
                self.round_trip_threshold,
                gates,
            )?
            .finish()
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("scorer", &self.scorer)
            .field("round_trip_threshold", &self.round_trip_threshold)
            .field("mode", &self.mode)
            .field("audit", &self.audit.is_some())
            .finish()
    }
}
