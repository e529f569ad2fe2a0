//! On-disk layout: bucket directories, entity and blob paths, atomic writes.
//!
//! ```text
//! <root>/version.json
//! <root>/item-pool/<bucket>/<id>.json
//! <root>/tag-pool/<bucket>/<id>.json
//! <root>/<file_pool_dir>/latest.json
//! <root>/<file_pool_dir>/<bucket>/<file id>
//! ```
//!
//! `bucket = floor(id / interval) * interval`.

use std::path::{Path, PathBuf};

use mediapool_core::{EntityKind, FileId};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};

pub const VERSION_FILE: &str = "version.json";
pub const COUNTER_FILE: &str = "latest.json";
pub const TEMP_SUFFIX: &str = ".tmp";

/// Resolved paths for one store root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
    file_root: PathBuf,
    interval: u64,
    fsync: bool,
}

impl Layout {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            root: config.root.clone(),
            file_root: config.file_pool_root(),
            interval: config.bucket_interval.max(1),
            fsync: config.fsync,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn file_root(&self) -> &Path {
        &self.file_root
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }

    pub fn bucket(&self, id: u64) -> u64 {
        id / self.interval * self.interval
    }

    pub fn version_path(&self) -> PathBuf {
        self.root.join(VERSION_FILE)
    }

    pub fn pool_dir(&self, kind: EntityKind) -> PathBuf {
        self.root.join(format!("{}-pool", kind.as_str()))
    }

    pub fn entity_path(&self, kind: EntityKind, id: u64) -> PathBuf {
        self.pool_dir(kind)
            .join(self.bucket(id).to_string())
            .join(format!("{}.json", id))
    }

    pub fn counter_path(&self) -> PathBuf {
        self.file_root.join(COUNTER_FILE)
    }

    pub fn file_path(&self, file: &FileId) -> PathBuf {
        self.file_root
            .join(self.bucket(file.number()).to_string())
            .join(file.to_string())
    }

    /// Write `bytes` to `path` via a sibling temp file and a rename.
    ///
    /// Parent directories must already exist.
    pub async fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let temp = temp_path(path);
        if tokio::fs::try_exists(&temp).await.unwrap_or(false) {
            warn!(path = %temp.display(), "Removing stale temp file");
            let _ = tokio::fs::remove_file(&temp).await;
        }

        if let Err(e) = self.write_temp(&temp, bytes).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e);
        }
        if let Err(e) = tokio::fs::rename(&temp, path).await {
            warn!(temp_path = %temp.display(), error = %e, "Rename failed, cleaning up temp file");
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(StoreError::io(path, e));
        }
        debug!(path = %path.display(), bytes = bytes.len(), "atomic write completed");
        Ok(())
    }

    async fn write_temp(&self, temp: &Path, bytes: &[u8]) -> Result<()> {
        let mut file = tokio::fs::File::create(temp)
            .await
            .map_err(|e| StoreError::io(temp, e))?;
        file.write_all(bytes).await.map_err(|e| StoreError::io(temp, e))?;
        if self.fsync {
            file.sync_all().await.map_err(|e| StoreError::io(temp, e))?;
        } else {
            file.flush().await.map_err(|e| StoreError::io(temp, e))?;
        }
        Ok(())
    }
}

/// `<name>.tmp` next to `path`.
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(TEMP_SUFFIX);
    path.with_file_name(name)
}

pub fn is_temp(name: &str) -> bool {
    name.ends_with(TEMP_SUFFIX)
}
