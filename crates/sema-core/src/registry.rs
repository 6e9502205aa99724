//! # Semantic Model Registry
//!
//! Stores registered models by handle. Registration is serialized behind a
//! write lock; lookups take a read lock and clone an `Arc`, so any number of
//! concurrent calls can resolve models while a new one is being registered.
//!
//! ## Invariants
//!
//! - A registered model is never mutated or overwritten. Registering a model
//!   with an already-used domain name mints a fresh handle; the earlier
//!   handle keeps resolving to the earlier model.
//! - Handles are scoped to the registry that minted them.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::constraint::ConstraintSet;
use crate::error::CoherenceError;
use crate::identity::{ModelHandle, RegistryId};
use crate::model::SemanticModel;

/// A model together with the constraints registered for it.
#[derive(Debug)]
pub struct RegisteredModel {
    handle: ModelHandle,
    model: SemanticModel,
    constraints: ConstraintSet,
}

impl RegisteredModel {
    /// The handle this entry was registered under.
    pub fn handle(&self) -> ModelHandle {
        self.handle
    }

    /// The semantic model.
    pub fn model(&self) -> &SemanticModel {
        &self.model
    }

    /// The constraints evaluated against values in this model.
    pub fn constraints(&self) -> &ConstraintSet {
        &self.constraints
    }
}

#[derive(Debug, Default)]
struct Entries {
    next_seq: u64,
    models: HashMap<u64, Arc<RegisteredModel>>,
}

/// Single-writer / many-reader store of semantic models.
#[derive(Debug)]
pub struct ModelRegistry {
    id: RegistryId,
    entries: RwLock<Entries>,
}

impl ModelRegistry {
    /// Create an empty registry with a fresh identity.
    pub fn new() -> Self {
        Self {
            id: RegistryId::new(),
            entries: RwLock::new(Entries::default()),
        }
    }

    /// This registry's identity.
    pub fn id(&self) -> RegistryId {
        self.id
    }

    /// Register a model with its constraints and return its handle.
    pub fn register(&self, model: SemanticModel, constraints: ConstraintSet) -> ModelHandle {
        let mut entries = self.entries.write();
        entries.next_seq += 1;
        let handle = ModelHandle::new(self.id, entries.next_seq);
        tracing::info!(
            domain = model.domain(),
            %handle,
            constraints = constraints.len(),
            "registered semantic model"
        );
        entries.models.insert(
            handle.seq(),
            Arc::new(RegisteredModel {
                handle,
                model,
                constraints,
            }),
        );
        handle
    }

    /// Resolve a handle.
    ///
    /// # Errors
    ///
    /// `ModelNotFound` if the handle was minted by another registry, was
    /// released, or never existed.
    pub fn lookup(&self, handle: ModelHandle) -> Result<Arc<RegisteredModel>, CoherenceError> {
        if handle.registry() != self.id {
            return Err(CoherenceError::ModelNotFound(handle));
        }
        self.entries
            .read()
            .models
            .get(&handle.seq())
            .cloned()
            .ok_or(CoherenceError::ModelNotFound(handle))
    }

    /// Drop the registry's reference to a model. Returns whether it was present.
    ///
    /// Calls already holding the entry keep it alive until they return.
    pub fn release(&self, handle: ModelHandle) -> bool {
        if handle.registry() != self.id {
            return false;
        }
        self.entries.write().models.remove(&handle.seq()).is_some()
    }

    /// Drop every held model. Returns how many were released.
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.write();
        let released = entries.models.len();
        entries.models.clear();
        released
    }

    /// Number of registered models.
    pub fn len(&self) -> usize {
        self.entries.read().models.len()
    }

    /// Whether no models are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}
