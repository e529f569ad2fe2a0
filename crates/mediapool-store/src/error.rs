//! Error types for mediapool-store

use std::path::PathBuf;

use mediapool_core::{CatalogError, EntityKind};
use thiserror::Error;

use crate::config::ConfigError;

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Main error type for storage and catalog operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// A pool operation failed, or a latched write failure was re-raised
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The store on disk was written by a different schema version
    #[error(
        "Store at {root} uses schema version {found}, this build requires {required}; \
         migrate the store from v{found} to v{required} before opening it"
    )]
    VersionMismatch {
        root: PathBuf,
        found: u32,
        required: u32,
    },

    #[error("{kind} {id} already exists on disk")]
    AlreadyExists { kind: EntityKind, id: u64 },

    #[error("Corrupt store file {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// The catalog was opened outside a tokio runtime
    #[error("No async runtime: {0}")]
    Runtime(String),
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        StoreError::Json {
            path: path.into(),
            source,
        }
    }

    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        StoreError::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// The pool-level error inside, if this wraps one.
    pub fn as_catalog(&self) -> Option<&CatalogError> {
        match self {
            StoreError::Catalog(e) => Some(e),
            _ => None,
        }
    }
}
