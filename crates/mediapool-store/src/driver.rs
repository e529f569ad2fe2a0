//! Storage driver abstraction
//!
//! The write queue talks to durable storage only through [`PoolDriver`].
//! Records travel as JSON values so one driver serves both pools.
//!
//! # Implementations
//!
//! - [`JsonFileDriver`](crate::pool_storage::JsonFileDriver): one JSON file
//!   per entity in bucket directories
//! - [`MemoryDriver`]: in-memory map, for tests and ephemeral catalogs

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use mediapool_core::{CatalogError, EntityKind};
use parking_lot::Mutex;

use crate::error::{Result, StoreError};

/// Raw on-disk record of one entity.
pub type Record = serde_json::Value;

/// Durable per-entity storage.
///
/// `create` fails with [`StoreError::AlreadyExists`] when the entity is
/// present; `update` and `delete` fail with a not-found catalog error when
/// it is absent.
#[async_trait]
pub trait PoolDriver: Send + Sync {
    async fn create(&self, kind: EntityKind, id: u64, record: &Record) -> Result<()>;

    async fn update(&self, kind: EntityKind, id: u64, record: &Record) -> Result<()>;

    async fn delete(&self, kind: EntityKind, id: u64) -> Result<()>;

    /// Every stored record of `kind`, ordered by ID.
    async fn read_all(&self, kind: EntityKind) -> Result<Vec<Record>>;
}

pub(crate) fn not_found(kind: EntityKind, id: u64) -> StoreError {
    StoreError::Catalog(CatalogError::NotFound { kind, id })
}

/// Driver keeping records in memory.
///
/// An optional delay is awaited before every write, which makes ordering
/// bugs in callers observable.
#[derive(Debug, Default)]
pub struct MemoryDriver {
    records: Mutex<BTreeMap<(EntityKind, u64), Record>>,
    delay: Option<Duration>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn get(&self, kind: EntityKind, id: u64) -> Option<Record> {
        self.records.lock().get(&(kind, id)).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl PoolDriver for MemoryDriver {
    async fn create(&self, kind: EntityKind, id: u64, record: &Record) -> Result<()> {
        self.pause().await;
        let mut records = self.records.lock();
        if records.contains_key(&(kind, id)) {
            return Err(StoreError::AlreadyExists { kind, id });
        }
        records.insert((kind, id), record.clone());
        Ok(())
    }

    async fn update(&self, kind: EntityKind, id: u64, record: &Record) -> Result<()> {
        self.pause().await;
        match self.records.lock().get_mut(&(kind, id)) {
            Some(slot) => {
                *slot = record.clone();
                Ok(())
            }
            None => Err(not_found(kind, id)),
        }
    }

    async fn delete(&self, kind: EntityKind, id: u64) -> Result<()> {
        self.pause().await;
        self.records
            .lock()
            .remove(&(kind, id))
            .map(|_| ())
            .ok_or_else(|| not_found(kind, id))
    }

    async fn read_all(&self, kind: EntityKind) -> Result<Vec<Record>> {
        Ok(self
            .records
            .lock()
            .iter()
            .filter(|((k, _), _)| *k == kind)
            .map(|(_, record)| record.clone())
            .collect())
    }
}
