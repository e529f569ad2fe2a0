//! Blob storage for covers and originals, plus the file number counter.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use mediapool_core::{FileId, ItemPool, Snapshot};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Result, StoreError};
use crate::layout::{is_temp, Layout, COUNTER_FILE};

/// Files under the file pool root, addressed by [`FileId`].
///
/// `latest.json` holds the next number to hand out as decimal text. The
/// counter is only read and written under `counter`, which makes numbers
/// strictly increasing and gap-free across concurrent callers.
#[derive(Debug)]
pub struct FilePool {
    layout: Arc<Layout>,
    counter: Mutex<()>,
}

impl FilePool {
    pub fn new(layout: Arc<Layout>) -> Self {
        Self {
            layout,
            counter: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        self.layout.file_root()
    }

    /// Return the next file number and persist its successor.
    pub async fn request_file_number(&self) -> Result<u64> {
        let _guard = self.counter.lock().await;
        let path = self.layout.counter_path();
        let current = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text.trim().parse::<u64>().map_err(|e| {
                StoreError::corrupt(&path, format!("file counter is not a number: {}", e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => return Err(StoreError::io(&path, e)),
        };
        let root = self.layout.file_root();
        tokio::fs::create_dir_all(root)
            .await
            .map_err(|e| StoreError::io(root, e))?;
        let next = current
            .checked_add(1)
            .ok_or_else(|| StoreError::corrupt(&path, "file counter overflow"))?;
        self.layout
            .write_atomic(&path, next.to_string().as_bytes())
            .await?;
        debug!(number = current, "allocated file number");
        Ok(current)
    }

    pub async fn save_file(&self, file: &FileId, bytes: &[u8]) -> Result<()> {
        let path = self.layout.file_path(file);
        if let Some(bucket) = path.parent() {
            tokio::fs::create_dir_all(bucket)
                .await
                .map_err(|e| StoreError::io(bucket, e))?;
        }
        self.layout.write_atomic(&path, bytes).await?;
        debug!(file = %file, bytes = bytes.len(), "saved file");
        Ok(())
    }

    pub async fn load_file(&self, file: &FileId) -> Result<Vec<u8>> {
        let path = self.layout.file_path(file);
        tokio::fs::read(&path)
            .await
            .map_err(|e| StoreError::io(&path, e))
    }

    pub async fn file_exists(&self, file: &FileId) -> Result<bool> {
        let path = self.layout.file_path(file);
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| StoreError::io(&path, e))
    }

    /// Remove one file. Returns `false` if it was not there.
    pub async fn delete_file(&self, file: &FileId) -> Result<bool> {
        let path = self.layout.file_path(file);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(file = %file, "deleted file");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    /// Every stored file, sorted.
    pub async fn list_files(&self) -> Result<Vec<FileId>> {
        let root = self.layout.file_root();
        let mut out = Vec::new();
        let mut entries = match tokio::fs::read_dir(root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(StoreError::io(root, e)),
        };

        while let Some(entry) = entries.next_entry().await.map_err(|e| StoreError::io(root, e))? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name == COUNTER_FILE || is_temp(&name) {
                continue;
            }
            let path = entry.path();
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            if !is_dir || name.parse::<u64>().is_err() {
                warn!(path = %path.display(), "skipping unknown entry in file pool");
                continue;
            }

            let mut files = tokio::fs::read_dir(&path)
                .await
                .map_err(|e| StoreError::io(&path, e))?;
            while let Some(file) = files.next_entry().await.map_err(|e| StoreError::io(&path, e))? {
                let file_name = file.file_name().to_string_lossy().into_owned();
                if is_temp(&file_name) {
                    warn!(path = %file.path().display(), "ignoring stale temp file");
                    continue;
                }
                let path = file.path();
                match file_name.parse::<FileId>() {
                    // Names must round-trip, so `007` or a file in the wrong
                    // bucket is never mistaken for a pooled file.
                    Ok(id) if self.layout.file_path(&id) == path => out.push(id),
                    Ok(_) => warn!(path = %path.display(), "skipping misplaced file in file pool"),
                    Err(_) => warn!(path = %path.display(), "skipping unknown file in file pool"),
                }
            }
        }

        out.sort();
        Ok(out)
    }

    /// Files no item points to through `cover` or a single-file `original`.
    ///
    /// `current` is called after the directory walk, so the reference set
    /// reflects the item pool as it is once the listing is complete.
    pub async fn collect_unreferenced_files<F>(&self, current: F) -> Result<Vec<FileId>>
    where
        F: Fn() -> ItemPool,
    {
        let mut files = self.list_files().await?;
        let referenced: HashSet<FileId> = current().referenced_files();
        files.retain(|file| !referenced.contains(file));
        Ok(files)
    }

    /// Delete unreferenced files and return the ones actually removed.
    ///
    /// The reference set is re-derived from `current` before every
    /// deletion whenever the item pool has moved on, so a file an item
    /// started pointing to mid-clean is kept.
    pub async fn clean_unreferenced_files<F>(&self, current: F) -> Result<Vec<FileId>>
    where
        F: Fn() -> ItemPool,
    {
        let candidates = self.list_files().await?;
        let mut pool = current();
        let mut referenced = pool.referenced_files();
        let mut removed = Vec::new();

        for file in candidates {
            let latest = current();
            if !Arc::ptr_eq(latest.entities(), pool.entities()) {
                referenced = latest.referenced_files();
                pool = latest;
            }
            if referenced.contains(&file) {
                debug!(file = %file, "file referenced again, keeping it");
                continue;
            }
            if self.delete_file(&file).await? {
                removed.push(file);
            }
        }

        info!(removed = removed.len(), root = %self.root().display(), "cleaned unreferenced files");
        Ok(removed)
    }
}
