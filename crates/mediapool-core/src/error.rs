//! Error types for pool operations.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for pool operations
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Which pool an identifier belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Item,
    Tag,
}

impl EntityKind {
    /// Lowercase name, also used as the on-disk category prefix.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Item => "item",
            EntityKind::Tag => "tag",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of durable write issued for an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageOp {
    Create,
    Update,
    Delete,
}

impl fmt::Display for StorageOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageOp::Create => f.write_str("create"),
            StorageOp::Update => f.write_str("update"),
            StorageOp::Delete => f.write_str("delete"),
        }
    }
}

/// Errors from pool operations.
///
/// Everything except `StorageDriver` is raised synchronously by a pool
/// transition and leaves the pool untouched. `StorageDriver` is raised
/// asynchronously by the write queue and then re-raised by every later
/// mutation, so it must be cloneable.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CatalogError {
    #[error("Validation error: field '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: u64 },

    #[error("Tag name already in use: {0}")]
    DuplicateName(String),

    #[error("Item {id} has dependents: {reason}")]
    HasDependents { id: u64, reason: String },

    #[error("Field '{field}' of item {id} cannot be set directly")]
    ForbiddenMutation { id: u64, field: String },

    #[error("Item {0} cannot list itself as a child")]
    SelfReference(u64),

    #[error("Cursor {0} not found in index")]
    CursorNotFound(u64),

    #[error("Storage driver failed to {op} {kind} {id}: {cause}")]
    StorageDriver {
        kind: EntityKind,
        id: u64,
        op: StorageOp,
        cause: String,
    },
}

impl CatalogError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        CatalogError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn item_not_found(id: impl Into<u64>) -> Self {
        CatalogError::NotFound {
            kind: EntityKind::Item,
            id: id.into(),
        }
    }

    pub fn tag_not_found(id: impl Into<u64>) -> Self {
        CatalogError::NotFound {
            kind: EntityKind::Tag,
            id: id.into(),
        }
    }
}
