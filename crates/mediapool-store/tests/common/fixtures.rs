//! Shared helpers for store integration tests

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use mediapool_core::{EntityKind, ItemForm, StorageOp, TagForm};
use mediapool_store::{MemoryDriver, PoolDriver, Record, Result, StoreConfig, StoreError};
use tempfile::TempDir;

/// A fresh store root with small buckets and no fsync.
pub fn temp_store() -> (TempDir, StoreConfig) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let config = StoreConfig {
        bucket_interval: 10,
        fsync: false,
        ..StoreConfig::with_root(dir.path())
    };
    (dir, config)
}

pub fn item_form(title: &str) -> ItemForm {
    ItemForm {
        title: title.to_string(),
        ..Default::default()
    }
}

#[allow(dead_code)]
pub fn tag_form(name: &str) -> TagForm {
    TagForm {
        name: name.to_string(),
        ..Default::default()
    }
}

/// Memory driver whose writes start failing once `fail` is set.
#[allow(dead_code)]
#[derive(Debug, Default)]
pub struct FlakyDriver {
    pub inner: MemoryDriver,
    pub fail: AtomicBool,
}

#[allow(dead_code)]
impl FlakyDriver {
    pub fn break_now(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    fn guard(&self) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(StoreError::io(
                "flaky",
                std::io::Error::new(std::io::ErrorKind::Other, "disk unplugged"),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl PoolDriver for FlakyDriver {
    async fn create(&self, kind: EntityKind, id: u64, record: &Record) -> Result<()> {
        self.guard()?;
        self.inner.create(kind, id, record).await
    }

    async fn update(&self, kind: EntityKind, id: u64, record: &Record) -> Result<()> {
        self.guard()?;
        self.inner.update(kind, id, record).await
    }

    async fn delete(&self, kind: EntityKind, id: u64) -> Result<()> {
        self.guard()?;
        self.inner.delete(kind, id).await
    }

    async fn read_all(&self, kind: EntityKind) -> Result<Vec<Record>> {
        self.inner.read_all(kind).await
    }
}

/// Memory driver that logs every write it receives.
#[allow(dead_code)]
#[derive(Debug, Default)]
pub struct RecordingDriver {
    pub inner: MemoryDriver,
    log: Mutex<Vec<(StorageOp, EntityKind, u64)>>,
}

#[allow(dead_code)]
impl RecordingDriver {
    pub fn clear(&self) {
        self.log.lock().unwrap().clear();
    }

    /// IDs of `kind` that received an `op` write, in arrival order.
    pub fn seen(&self, op: StorageOp, kind: EntityKind) -> Vec<u64> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|(o, k, _)| *o == op && *k == kind)
            .map(|(_, _, id)| *id)
            .collect()
    }

    fn record(&self, op: StorageOp, kind: EntityKind, id: u64) {
        self.log.lock().unwrap().push((op, kind, id));
    }
}

#[async_trait]
impl PoolDriver for RecordingDriver {
    async fn create(&self, kind: EntityKind, id: u64, record: &Record) -> Result<()> {
        self.record(StorageOp::Create, kind, id);
        self.inner.create(kind, id, record).await
    }

    async fn update(&self, kind: EntityKind, id: u64, record: &Record) -> Result<()> {
        self.record(StorageOp::Update, kind, id);
        self.inner.update(kind, id, record).await
    }

    async fn delete(&self, kind: EntityKind, id: u64) -> Result<()> {
        self.record(StorageOp::Delete, kind, id);
        self.inner.delete(kind, id).await
    }

    async fn read_all(&self, kind: EntityKind) -> Result<Vec<Record>> {
        self.inner.read_all(kind).await
    }
}
