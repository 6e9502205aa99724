//! # Constraints
//!
//! A [`Constraint`] binds a caller-supplied predicate `(value, model) -> bool`
//! to a [`ConstraintLayer`] and a human-readable failure tag. The engine does
//! not interpret why a predicate fails, only whether it does.
//!
//! A [`ConstraintSet`] groups constraints by layer, preserving registration
//! order within each layer. Evaluation lives in `sema-validate`.

use std::fmt;
use std::sync::Arc;

use crate::layer::ConstraintLayer;
use crate::model::SemanticModel;
use crate::representation::Representation;

/// A pure predicate over a representation and its model.
pub type Predicate = Arc<dyn Fn(&Representation, &SemanticModel) -> bool + Send + Sync>;

/// A predicate bound to a layer and a failure tag.
#[derive(Clone)]
pub struct Constraint {
    layer: ConstraintLayer,
    tag: String,
    predicate: Predicate,
}

impl Constraint {
    /// Bind `predicate` to `layer` under `tag`.
    pub fn new<F>(layer: ConstraintLayer, tag: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Representation, &SemanticModel) -> bool + Send + Sync + 'static,
    {
        Self {
            layer,
            tag: tag.into(),
            predicate: Arc::new(predicate),
        }
    }

    /// The layer this constraint belongs to.
    pub fn layer(&self) -> ConstraintLayer {
        self.layer
    }

    /// The failure tag reported when the predicate returns false.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Invoke the predicate.
    pub fn holds(&self, value: &Representation, model: &SemanticModel) -> bool {
        (self.predicate)(value, model)
    }
}

impl fmt::Debug for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constraint")
            .field("layer", &self.layer)
            .field("tag", &self.tag)
            .finish_non_exhaustive()
    }
}

/// Constraints grouped by layer.
#[derive(Debug, Clone, Default)]
pub struct ConstraintSet {
    semantic: Vec<Constraint>,
    structural: Vec<Constraint>,
    contextual: Vec<Constraint>,
}

impl ConstraintSet {
    /// An empty set. Every layer passes vacuously.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a constraint to its layer.
    pub fn push(&mut self, constraint: Constraint) {
        match constraint.layer {
            ConstraintLayer::Semantic => self.semantic.push(constraint),
            ConstraintLayer::Structural => self.structural.push(constraint),
            ConstraintLayer::Contextual => self.contextual.push(constraint),
        }
    }

    /// Builder-style [`push`](Self::push).
    pub fn with(mut self, constraint: Constraint) -> Self {
        self.push(constraint);
        self
    }

    /// Builder-style registration of a predicate.
    pub fn with_predicate<F>(self, layer: ConstraintLayer, tag: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Representation, &SemanticModel) -> bool + Send + Sync + 'static,
    {
        self.with(Constraint::new(layer, tag, predicate))
    }

    /// Append every constraint of `other`.
    pub fn extend(&mut self, other: ConstraintSet) {
        self.semantic.extend(other.semantic);
        self.structural.extend(other.structural);
        self.contextual.extend(other.contextual);
    }

    /// Constraints registered for `layer`, in registration order.
    pub fn layer(&self, layer: ConstraintLayer) -> &[Constraint] {
        match layer {
            ConstraintLayer::Semantic => &self.semantic,
            ConstraintLayer::Structural => &self.structural,
            ConstraintLayer::Contextual => &self.contextual,
        }
    }

    /// Total number of constraints.
    pub fn len(&self) -> usize {
        self.semantic.len() + self.structural.len() + self.contextual.len()
    }

    /// Whether no constraints are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
