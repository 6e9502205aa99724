//! # Identifier Newtypes
//!
//! Newtype wrappers for the identifiers that cross crate boundaries. A
//! `FormatId` cannot be passed where a `ModelHandle` is expected, and a
//! handle minted by one registry cannot silently resolve in another.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ModelError;

/// Opaque, caller-defined representation tag (e.g. `"json"`, `"packed"`, `"ui"`).
///
/// The engine never interprets a format; it only compares tags. Construction
/// rejects empty and whitespace-bearing tags.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FormatId(String);

impl FormatId {
    /// Create a format tag.
    pub fn new(tag: impl Into<String>) -> Result<Self, ModelError> {
        let tag = tag.into();
        if tag.is_empty() || tag.chars().any(char::is_whitespace) {
            return Err(ModelError::InvalidFormatId(tag));
        }
        Ok(Self(tag))
    }

    /// The tag text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for FormatId {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<FormatId> for String {
    fn from(id: FormatId) -> Self {
        id.0
    }
}

impl std::fmt::Display for FormatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for a model registry (one per engine context).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegistryId(pub Uuid);

impl RegistryId {
    /// Generate a new random registry identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RegistryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RegistryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "registry:{}", self.0)
    }
}

/// Handle to a model registered in a specific registry.
///
/// Handles are cheap `Copy` values. Resolving one against a registry other
/// than the one that minted it fails with `ModelNotFound`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelHandle {
    registry: RegistryId,
    seq: u64,
}

impl ModelHandle {
    pub(crate) fn new(registry: RegistryId, seq: u64) -> Self {
        Self { registry, seq }
    }

    /// The registry that minted this handle.
    pub fn registry(&self) -> RegistryId {
        self.registry
    }

    /// Registration sequence number within the registry (starts at 1).
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl std::fmt::Display for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "model:{}#{}", self.registry.0, self.seq)
    }
}
