//! Configuration for mediapool-store
//!
//! Where the store lives on disk and how it is laid out.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default number of consecutive IDs sharing one bucket directory.
pub const DEFAULT_BUCKET_INTERVAL: u64 = 4000;

/// Store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Storage root holding `version.json` and the pool directories
    pub root: PathBuf,
    /// File pool directory, relative to `root`
    pub file_pool_dir: PathBuf,
    /// IDs per bucket directory
    pub bucket_interval: u64,
    /// Sync file contents to disk before each rename
    pub fsync: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("mediapool"),
            file_pool_dir: PathBuf::from("files"),
            bucket_interval: DEFAULT_BUCKET_INTERVAL,
            fsync: true,
        }
    }
}

impl StoreConfig {
    /// Default configuration rooted at `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Load configuration from a TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Serialize configuration to TOML
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Load configuration from a JSON string
    pub fn from_json(json_str: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json_str)
    }

    /// Read and validate a config file. `.json` files are parsed as JSON,
    /// anything else as TOML.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let config = if path.extension().is_some_and(|ext| ext == "json") {
            Self::from_json(&text).map_err(|e| ConfigError::Parse(e.to_string()))?
        } else {
            Self::from_toml(&text).map_err(|e| ConfigError::Parse(e.to_string()))?
        };
        config.validate()?;
        Ok(config)
    }

    /// Absolute directory of the file pool.
    pub fn file_pool_root(&self) -> PathBuf {
        self.root.join(&self.file_pool_dir)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bucket_interval == 0 {
            return Err(ConfigError::OutOfRange(
                "bucket_interval must be positive".to_string(),
            ));
        }

        let mut components = self.file_pool_dir.components();
        let first = components.next();
        let valid = matches!(first, Some(Component::Normal(_)))
            && components.all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(ConfigError::InvalidPath(format!(
                "file_pool_dir must be a plain relative path, got {}",
                self.file_pool_dir.display()
            )));
        }

        // The first component must not shadow anything else under the root.
        if let Some(Component::Normal(name)) = first {
            let name = name.to_string_lossy();
            if name.ends_with("-pool") || name == crate::layout::VERSION_FILE {
                return Err(ConfigError::InvalidPath(format!(
                    "file_pool_dir '{}' collides with a reserved store name",
                    name
                )));
            }
        }

        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Value out of range: {0}")]
    OutOfRange(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Cannot read {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}
