//! One JSON file per entity, sharded into bucket directories.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use mediapool_core::EntityKind;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::driver::{not_found, PoolDriver, Record};
use crate::error::{Result, StoreError};
use crate::layout::{is_temp, Layout};

/// File-backed [`PoolDriver`].
///
/// Every write takes `sequence`, so bucket directories are never created
/// by two writers at once.
#[derive(Debug)]
pub struct JsonFileDriver {
    layout: Arc<Layout>,
    sequence: Mutex<()>,
}

impl JsonFileDriver {
    pub fn new(layout: Arc<Layout>) -> Self {
        Self {
            layout,
            sequence: Mutex::new(()),
        }
    }

    async fn write_record(&self, path: &Path, record: &Record) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(record).map_err(|e| StoreError::json(path, e))?;
        self.layout.write_atomic(path, &bytes).await
    }
}

async fn exists(path: &Path) -> Result<bool> {
    tokio::fs::try_exists(path)
        .await
        .map_err(|e| StoreError::io(path, e))
}

#[async_trait]
impl PoolDriver for JsonFileDriver {
    async fn create(&self, kind: EntityKind, id: u64, record: &Record) -> Result<()> {
        let _seq = self.sequence.lock().await;
        let path = self.layout.entity_path(kind, id);
        if exists(&path).await? {
            return Err(StoreError::AlreadyExists { kind, id });
        }
        if let Some(bucket) = path.parent() {
            tokio::fs::create_dir_all(bucket)
                .await
                .map_err(|e| StoreError::io(bucket, e))?;
        }
        self.write_record(&path, record).await?;
        debug!(%kind, id, path = %path.display(), "created record");
        Ok(())
    }

    async fn update(&self, kind: EntityKind, id: u64, record: &Record) -> Result<()> {
        let _seq = self.sequence.lock().await;
        let path = self.layout.entity_path(kind, id);
        if !exists(&path).await? {
            return Err(not_found(kind, id));
        }
        self.write_record(&path, record).await?;
        debug!(%kind, id, path = %path.display(), "updated record");
        Ok(())
    }

    async fn delete(&self, kind: EntityKind, id: u64) -> Result<()> {
        let _seq = self.sequence.lock().await;
        let path = self.layout.entity_path(kind, id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(%kind, id, path = %path.display(), "deleted record");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(not_found(kind, id)),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    async fn read_all(&self, kind: EntityKind) -> Result<Vec<Record>> {
        let dir = self.layout.pool_dir(kind);
        let mut out: Vec<(u64, Record)> = Vec::new();

        let mut buckets = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&dir, e)),
        };
        while let Some(bucket) = buckets.next_entry().await.map_err(|e| StoreError::io(&dir, e))? {
            let bucket_path = bucket.path();
            let is_bucket = bucket.file_type().await.map(|t| t.is_dir()).unwrap_or(false)
                && bucket
                    .file_name()
                    .to_str()
                    .is_some_and(|name| name.parse::<u64>().is_ok());
            if !is_bucket {
                warn!(path = %bucket_path.display(), "skipping unknown entry in pool directory");
                continue;
            }

            let mut files = tokio::fs::read_dir(&bucket_path)
                .await
                .map_err(|e| StoreError::io(&bucket_path, e))?;
            while let Some(file) = files
                .next_entry()
                .await
                .map_err(|e| StoreError::io(&bucket_path, e))?
            {
                let path = file.path();
                let name = file.file_name().to_string_lossy().into_owned();
                if is_temp(&name) {
                    warn!(path = %path.display(), "ignoring stale temp file");
                    continue;
                }
                let Some(id) = name.strip_suffix(".json").and_then(|s| s.parse::<u64>().ok()) else {
                    warn!(path = %path.display(), "skipping unknown file in bucket");
                    continue;
                };

                let bytes = tokio::fs::read(&path)
                    .await
                    .map_err(|e| StoreError::io(&path, e))?;
                let record: Record =
                    serde_json::from_slice(&bytes).map_err(|e| StoreError::json(&path, e))?;
                match record.get("id").and_then(|v| v.as_u64()) {
                    Some(found) if found == id => {}
                    found => {
                        return Err(StoreError::corrupt(
                            &path,
                            format!("file name says id {} but record holds {:?}", id, found),
                        ))
                    }
                }
                if self.layout.entity_path(kind, id) != path {
                    return Err(StoreError::corrupt(&path, "record is in the wrong bucket"));
                }
                out.push((id, record));
            }
        }

        out.sort_by_key(|(id, _)| *id);
        info!(%kind, records = out.len(), dir = %dir.display(), "read pool directory");
        Ok(out.into_iter().map(|(_, record)| record).collect())
    }
}
