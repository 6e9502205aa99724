//! # Stream Processor
//!
//! Per-reading validation for continuous ingestion. Each reading is judged
//! on its own; a rejected reading never halts the stream. Buffering,
//! dropping or flagging drift is the caller's decision.
//!
//! Bounds sit on top of the model's Contextual layer. A bare numeric
//! reading must pass every Contextual constraint; a structured reading must
//! pass every registered constraint. Then the quantity must be finite,
//! inside `[min, max]`, and (when both sides name one) in the expected unit.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use sema_core::{
    Checkpoint, CoherenceError, ConstraintLayer, FieldKind, FieldSpec, FormatId, RegisteredModel,
    Representation, Violation,
};
use sema_validate::{check_layer, validate, ValidationMode, Verdict};

/// Tag of the finiteness check.
pub const READING_NOT_FINITE: &str = "reading_not_finite";
/// Tag of the range check.
pub const READING_OUT_OF_RANGE: &str = "reading_out_of_range";
/// Tag raised when a structured reading lacks the bounded quantity.
pub const READING_MISSING_QUANTITY: &str = "reading_missing_quantity";
/// Tag of the unit check.
pub const UNIT_MISMATCH: &str = "unit_mismatch";

/// Format under which bare numeric readings are presented to constraints.
pub const BARE_READING_FORMAT: &str = "reading";

/// Numeric range for one quantity, e.g. temperature in [-40, 85] °C.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamBounds {
    /// Name of the quantity; also its field path in structured readings.
    pub quantity: String,
    /// Inclusive lower bound.
    pub min: f64,
    /// Inclusive upper bound.
    pub max: f64,
    /// Expected unit, if readings declare one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl StreamBounds {
    /// Validated bounds.
    pub fn new(quantity: impl Into<String>, min: f64, max: f64) -> Result<Self, CoherenceError> {
        let bounds = Self {
            quantity: quantity.into(),
            min,
            max,
            unit: None,
        };
        bounds.validate()?;
        Ok(bounds)
    }

    /// Require readings that name a unit to name this one.
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Check the bounds are usable.
    pub fn validate(&self) -> Result<(), CoherenceError> {
        if self.quantity.is_empty() {
            return Err(CoherenceError::InvalidConfig(
                "stream bounds need a quantity name".into(),
            ));
        }
        if !self.min.is_finite() || !self.max.is_finite() || self.min > self.max {
            return Err(CoherenceError::InvalidConfig(format!(
                "stream bounds for '{}' must satisfy finite min <= max, got [{}, {}]",
                self.quantity, self.min, self.max
            )));
        }
        Ok(())
    }

    /// Whether `reading` lies within the bounds.
    pub fn contains(&self, reading: f64) -> bool {
        reading >= self.min && reading <= self.max
    }
}

/// Validates readings against one model and one set of bounds.
#[derive(Debug)]
pub struct StreamProcessor {
    entry: Arc<RegisteredModel>,
    bounds: StreamBounds,
    bare_format: FormatId,
    accepted: AtomicU64,
    rejected: AtomicU64,
}

impl StreamProcessor {
    pub(crate) fn new(entry: Arc<RegisteredModel>, bounds: StreamBounds) -> Result<Self, CoherenceError> {
        bounds.validate()?;
        tracing::debug!(
            domain = entry.model().domain(),
            quantity = %bounds.quantity,
            min = bounds.min,
            max = bounds.max,
            "stream processor created"
        );
        Ok(Self {
            entry,
            bounds,
            bare_format: FormatId::new(BARE_READING_FORMAT)?,
            accepted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        })
    }

    /// The configured bounds.
    pub fn bounds(&self) -> &StreamBounds {
        &self.bounds
    }

    /// Readings accepted so far.
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    /// Readings rejected so far.
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Whether a bare numeric reading passes the Contextual layer and the bounds.
    pub fn validate_stream_coherence(&self, reading: f64) -> bool {
        let value = Representation::new(self.bare_format.clone(), Value::from(reading));
        let result = self
            .check_contextual(&value)
            .and_then(|()| self.check_bounds(reading));
        self.tally(result).is_ok()
    }

    /// Validate a structured reading against the model's constraints and the bounds.
    ///
    /// The payload is either a bare number or an object carrying the quantity
    /// at its field path, optionally with a sibling `unit` string.
    ///
    /// # Errors
    ///
    /// The first failing layer's violation, or `ContextualViolation` for a
    /// bounds failure. A panicking predicate yields `InternalCallbackFailure`
    /// and is not counted.
    pub fn validate_reading(&self, reading: &Representation) -> Result<(), CoherenceError> {
        if reading.payload.is_number() {
            if let Err(e) = self.check_contextual(reading) {
                return self.tally(Err(e));
            }
        } else {
            let report = validate(
                self.entry.constraints(),
                reading,
                self.entry.model(),
                ValidationMode::FastPath,
                Checkpoint::Stream,
            )?;
            if let Err(e) = report.into_result(Checkpoint::Stream) {
                return self.tally(Err(e));
            }
        }
        let result = self.extract(&reading.payload).and_then(|v| self.check_bounds(v));
        self.tally(result)
    }

    fn check_contextual(&self, value: &Representation) -> Result<(), CoherenceError> {
        let verdict = check_layer(
            self.entry.constraints(),
            ConstraintLayer::Contextual,
            value,
            self.entry.model(),
            Checkpoint::Stream,
        )?;
        match verdict {
            Verdict::Pass => Ok(()),
            Verdict::Fail(tag) => Err(contextual(&tag)),
        }
    }

    fn extract(&self, payload: &Value) -> Result<f64, CoherenceError> {
        if let Some(n) = payload.as_f64() {
            return Ok(n);
        }
        let field = FieldSpec::new(self.bounds.quantity.clone(), FieldKind::Number);
        let value = field
            .lookup(payload)
            .and_then(Value::as_f64)
            .ok_or_else(|| contextual(READING_MISSING_QUANTITY))?;
        if let (Some(expected), Some(unit)) = (&self.bounds.unit, unit_of(payload)) {
            if unit != expected {
                return Err(contextual(UNIT_MISMATCH));
            }
        }
        Ok(value)
    }

    fn check_bounds(&self, reading: f64) -> Result<(), CoherenceError> {
        if !reading.is_finite() {
            return Err(contextual(READING_NOT_FINITE));
        }
        if !self.bounds.contains(reading) {
            tracing::warn!(
                domain = self.entry.model().domain(),
                quantity = %self.bounds.quantity,
                reading,
                min = self.bounds.min,
                max = self.bounds.max,
                "stream reading out of bounds"
            );
            return Err(contextual(READING_OUT_OF_RANGE));
        }
        Ok(())
    }

    fn tally(&self, result: Result<(), CoherenceError>) -> Result<(), CoherenceError> {
        match &result {
            Ok(()) => self.accepted.fetch_add(1, Ordering::Relaxed),
            Err(CoherenceError::InternalCallbackFailure { .. }) => 0,
            Err(_) => self.rejected.fetch_add(1, Ordering::Relaxed),
        };
        result
    }
}

fn unit_of(payload: &Value) -> Option<&str> {
    payload.get("unit").and_then(Value::as_str)
}

fn contextual(tag: &str) -> CoherenceError {
    CoherenceError::violation(Violation::new(Checkpoint::Stream, ConstraintLayer::Contextual, tag))
}
