//! The catalog: both pools, their write queue, and the file pool.
//!
//! Every mutation runs as a pool transition inside a [`PoolCell`]. The
//! cell's observer diffs the snapshots before and after and enqueues one
//! durable write per changed entity. A write failure latches [`Health`];
//! from then on every mutation fails with that failure.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use mediapool_core::{
    diff, CatalogError, EntityKind, FileId, Item, ItemForm, ItemId, ItemPatch, ItemPool,
    ItemRecord, ListQuery, PoolCell, PoolObserver, Snapshot, Tag, TagForm, TagId, TagPatch,
    TagPool, TagQuery,
};
use serde::Serialize;
use tokio::runtime::Handle;
use tracing::{error, info, warn};

use crate::config::StoreConfig;
use crate::driver::{PoolDriver, Record};
use crate::error::{Result, StoreError};
use crate::file_pool::FilePool;
use crate::health::Health;
use crate::layout::Layout;
use crate::pool_storage::JsonFileDriver;
use crate::queue::StorageQueue;
use crate::version::check_version;

/// Counts reported by [`Catalog::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CatalogStats {
    pub items: usize,
    pub tags: usize,
    pub latest_item_id: u64,
    pub latest_tag_id: u64,
    pub pending_writes: usize,
}

/// A pool whose entities can be turned into driver records.
trait Persisted: Snapshot + Send + Sync + 'static {
    const KIND: EntityKind;

    fn raw_id(id: Self::Id) -> u64;

    fn record(entity: &Self::Entity) -> serde_json::Result<Record>;
}

impl Persisted for ItemPool {
    const KIND: EntityKind = EntityKind::Item;

    fn raw_id(id: ItemId) -> u64 {
        id.get()
    }

    fn record(item: &Item) -> serde_json::Result<Record> {
        serde_json::to_value(item.to_record())
    }
}

impl Persisted for TagPool {
    const KIND: EntityKind = EntityKind::Tag;

    fn raw_id(id: TagId) -> u64 {
        id.get()
    }

    fn record(tag: &Tag) -> serde_json::Result<Record> {
        serde_json::to_value(tag)
    }
}

/// Observer turning pool diffs into queued writes.
struct Persist {
    queue: StorageQueue,
    health: Health,
}

impl Persist {
    fn record_of<P: Persisted>(&self, pool: &P, id: P::Id) -> mediapool_core::Result<Record> {
        let op_failure = |cause: String| CatalogError::StorageDriver {
            kind: P::KIND,
            id: P::raw_id(id),
            op: mediapool_core::StorageOp::Update,
            cause,
        };
        let entity = pool
            .entities()
            .get(&id)
            .ok_or_else(|| op_failure("entity vanished from snapshot".into()))?;
        P::record(entity).map_err(|e| {
            let failure = op_failure(e.to_string());
            self.health.trip(failure.clone());
            failure
        })
    }
}

impl<P: Persisted> PoolObserver<P> for Persist {
    fn check(&self) -> mediapool_core::Result<()> {
        self.health.check()
    }

    fn updated(&self, op: &str, previous: &P, current: &P) -> mediapool_core::Result<()> {
        let changes = diff(current, previous);
        tracing::trace!(op, kind = %P::KIND, changes = changes.len(), "persisting diff");
        for id in changes.deleted {
            self.queue.delete(P::KIND, P::raw_id(id));
        }
        for id in changes.added {
            let record = self.record_of(current, id)?;
            self.queue.create(P::KIND, P::raw_id(id), record);
        }
        for id in changes.changed {
            let record = self.record_of(current, id)?;
            self.queue.update(P::KIND, P::raw_id(id), record);
        }
        Ok(())
    }
}

/// A media catalog backed by a store root.
pub struct Catalog {
    config: StoreConfig,
    items: PoolCell<ItemPool>,
    tags: PoolCell<TagPool>,
    queue: StorageQueue,
    health: Health,
    files: FilePool,
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("root", &self.config.root)
            .field("stats", &self.stats())
            .finish()
    }
}

impl Catalog {
    /// Open (or initialize) the store at `config.root` with JSON file storage.
    pub async fn open(config: StoreConfig) -> Result<Self> {
        config.validate()?;
        let layout = Arc::new(Layout::new(&config));
        let driver = Arc::new(JsonFileDriver::new(Arc::clone(&layout)));
        Self::open_with_driver(config, driver).await
    }

    /// Open with a caller-supplied driver. The version check and the file
    /// pool still use `config.root`.
    pub async fn open_with_driver(config: StoreConfig, driver: Arc<dyn PoolDriver>) -> Result<Self> {
        config.validate()?;
        let layout = Arc::new(Layout::new(&config));
        check_version(&layout).await?;

        let item_records = driver.read_all(EntityKind::Item).await?;
        let tag_records = driver.read_all(EntityKind::Tag).await?;
        let items = hydrate_items(&layout, item_records)?;
        let tags = hydrate_tags(&layout, tag_records)?;
        warn_on_missing_tags(&items, &tags);

        let runtime = Handle::try_current().map_err(|e| StoreError::Runtime(e.to_string()))?;
        let health = Health::new();
        let queue = StorageQueue::new(driver, health.clone(), runtime);
        let persist = || Persist {
            queue: queue.clone(),
            health: health.clone(),
        };

        info!(
            root = %config.root.display(),
            items = items.len(),
            tags = tags.len(),
            "catalog opened"
        );
        Ok(Self {
            items: PoolCell::new(items, persist()),
            tags: PoolCell::new(tags, persist()),
            files: FilePool::new(layout),
            config,
            queue,
            health,
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Current item snapshot.
    pub fn items(&self) -> ItemPool {
        self.items.snapshot()
    }

    /// Current tag snapshot.
    pub fn tags(&self) -> TagPool {
        self.tags.snapshot()
    }

    // --- items ---

    pub fn create_item(&self, form: ItemForm) -> Result<Arc<Item>> {
        let item = self.items.apply("create_item", |pool| {
            self.check_tags(&form.tags)?;
            pool.create(form, Utc::now())
        })?;
        Ok(item)
    }

    pub fn get_item(&self, id: ItemId) -> Result<Arc<Item>> {
        Ok(self.items.read(|pool| pool.get(id).cloned())?)
    }

    pub fn list_items(&self, query: &ListQuery) -> Result<Vec<Arc<Item>>> {
        Ok(self.items.read(|pool| pool.list(query))?)
    }

    pub fn update_item(&self, id: ItemId, patch: ItemPatch) -> Result<Arc<Item>> {
        let item = self.items.apply("update_item", |pool| {
            if let Some(tags) = &patch.tags {
                self.check_tags(tags)?;
            }
            let next = pool.update(id, patch, Utc::now())?;
            let item = Arc::clone(next.get(id)?);
            Ok((item, next))
        })?;
        Ok(item)
    }

    pub fn delete_item(&self, id: ItemId) -> Result<()> {
        self.items.apply("delete_item", |pool| pool.delete(id))?;
        Ok(())
    }

    // --- tags ---

    pub fn create_tag(&self, form: TagForm) -> Result<Arc<Tag>> {
        Ok(self.tags.apply("create_tag", |pool| pool.create(form))?)
    }

    pub fn get_tag(&self, id: TagId) -> Result<Arc<Tag>> {
        Ok(self.tags.read(|pool| pool.get(id).cloned())?)
    }

    pub fn find_tag(&self, name: &str) -> Option<Arc<Tag>> {
        self.tags.read(|pool| pool.find_by_name(name).cloned())
    }

    pub fn list_tags(&self, query: &TagQuery) -> Result<Vec<Arc<Tag>>> {
        Ok(self.tags.read(|pool| pool.list(query))?)
    }

    pub fn update_tag(&self, id: TagId, patch: TagPatch) -> Result<Arc<Tag>> {
        let tag = self.tags.apply("update_tag", |pool| {
            let next = pool.update(id, patch)?;
            let tag = Arc::clone(next.get(id)?);
            Ok((tag, next))
        })?;
        Ok(tag)
    }

    /// Delete a tag and strip it from every item. Returns how many items
    /// were updated.
    ///
    /// The tag pool and the item pool are separate cells, so this is two
    /// transitions. Both are refused up front if storage has already
    /// failed. If storage fails between them the tag is gone while items
    /// still carry its ID. The error is returned and the catalog is
    /// already latched read-only.
    pub fn delete_tag(&self, id: TagId) -> Result<usize> {
        self.health.check()?;
        self.tags.apply("delete_tag", |pool| pool.delete(id))?;
        let stripped = self
            .items
            .apply("strip_tag", |pool| {
                Ok::<_, CatalogError>(pool.remove_tag(id, Utc::now()))
            })
            .map_err(|e| {
                error!(tag = %id, error = %e, "tag deleted but items still reference it");
                e
            })?;
        if stripped > 0 {
            info!(tag = %id, items = stripped, "removed deleted tag from items");
        }
        Ok(stripped)
    }

    fn check_tags(&self, tags: &[TagId]) -> mediapool_core::Result<()> {
        self.tags.read(|pool| {
            match tags.iter().find(|tag| !pool.contains(**tag)) {
                Some(missing) => Err(CatalogError::validation(
                    "tags",
                    format!("tag {} does not exist", missing),
                )),
                None => Ok(()),
            }
        })
    }

    // --- files ---

    pub fn file_pool(&self) -> &FilePool {
        &self.files
    }

    pub async fn request_file_number(&self) -> Result<u64> {
        self.files.request_file_number().await
    }

    pub async fn save_file(&self, file: &FileId, bytes: &[u8]) -> Result<()> {
        self.files.save_file(file, bytes).await
    }

    pub async fn load_file(&self, file: &FileId) -> Result<Vec<u8>> {
        self.files.load_file(file).await
    }

    pub async fn file_exists(&self, file: &FileId) -> Result<bool> {
        self.files.file_exists(file).await
    }

    pub async fn delete_file(&self, file: &FileId) -> Result<bool> {
        self.files.delete_file(file).await
    }

    pub async fn collect_unreferenced_files(&self) -> Result<Vec<FileId>> {
        self.files
            .collect_unreferenced_files(|| self.items.snapshot())
            .await
    }

    /// Delete unreferenced files. Each file is checked against the live
    /// item pool right before it is removed, so covers and originals set
    /// while the clean runs survive it.
    pub async fn clean_unreferenced_files(&self) -> Result<Vec<FileId>> {
        self.files
            .clean_unreferenced_files(|| self.items.snapshot())
            .await
    }

    // --- lifecycle ---

    pub fn stats(&self) -> CatalogStats {
        let (items, latest_item_id) = self.items.read(|pool| (pool.len(), pool.latest_id()));
        let (tags, latest_tag_id) = self.tags.read(|pool| (pool.len(), pool.latest_id()));
        CatalogStats {
            items,
            tags,
            latest_item_id,
            latest_tag_id,
            pending_writes: self.queue.pending(),
        }
    }

    /// The latched storage failure, if any.
    pub fn failure(&self) -> Option<CatalogError> {
        self.health.failure()
    }

    /// Wait for every queued write to finish.
    pub async fn flush(&self) {
        self.queue.flush().await
    }

    /// Flush and report the latched failure, if any.
    pub async fn close(self) -> Result<()> {
        self.flush().await;
        self.health.check()?;
        info!(root = %self.config.root.display(), "catalog closed");
        Ok(())
    }
}

fn record_id(record: &Record) -> u64 {
    record.get("id").and_then(|v| v.as_u64()).unwrap_or(0)
}

fn hydrate_items(layout: &Layout, records: Vec<Record>) -> Result<ItemPool> {
    let parsed = records
        .into_iter()
        .map(|record| {
            let id = record_id(&record);
            serde_json::from_value::<ItemRecord>(record).map_err(|e| {
                StoreError::corrupt(layout.entity_path(EntityKind::Item, id), e.to_string())
            })
        })
        .collect::<Result<Vec<_>>>()?;
    ItemPool::from_records(parsed)
        .map_err(|e| StoreError::corrupt(layout.pool_dir(EntityKind::Item), e.to_string()))
}

fn hydrate_tags(layout: &Layout, records: Vec<Record>) -> Result<TagPool> {
    let parsed = records
        .into_iter()
        .map(|record| {
            let id = record_id(&record);
            serde_json::from_value::<Tag>(record).map_err(|e| {
                StoreError::corrupt(layout.entity_path(EntityKind::Tag, id), e.to_string())
            })
        })
        .collect::<Result<Vec<_>>>()?;
    TagPool::from_records(parsed)
        .map_err(|e| StoreError::corrupt(layout.pool_dir(EntityKind::Tag), e.to_string()))
}

fn warn_on_missing_tags(items: &ItemPool, tags: &TagPool) {
    let missing: HashSet<TagId> = items
        .iter()
        .flat_map(|item| item.tags.iter().copied())
        .filter(|tag| !tags.contains(*tag))
        .collect();
    for tag in missing {
        warn!(tag = %tag, "items reference a tag that does not exist");
    }
}
