//! Per-entity write lanes.
//!
//! Each `(kind, id)` gets its own FIFO lane drained by one task, so writes
//! to the same entity reach the driver in the order they were issued while
//! writes to different entities proceed concurrently. A lane's task exits
//! once the lane is empty; the next write to that entity starts a new one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use mediapool_core::{CatalogError, EntityKind, StorageOp};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, trace};

use crate::driver::{PoolDriver, Record};
use crate::health::Health;

type LaneKey = (EntityKind, u64);

/// A durable write waiting in a lane.
#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    Create(Record),
    Update(Record),
    Delete,
}

impl Write {
    pub fn op(&self) -> StorageOp {
        match self {
            Write::Create(_) => StorageOp::Create,
            Write::Update(_) => StorageOp::Update,
            Write::Delete => StorageOp::Delete,
        }
    }
}

struct Inner {
    driver: Arc<dyn PoolDriver>,
    health: Health,
    runtime: Handle,
    lanes: Mutex<HashMap<LaneKey, mpsc::UnboundedSender<Write>>>,
    pending: AtomicUsize,
    idle: Notify,
}

/// Queue of durable writes. Cloning shares the lanes.
#[derive(Clone)]
pub struct StorageQueue {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for StorageQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageQueue")
            .field("pending", &self.pending())
            .field("lanes", &self.inner.lanes.lock().len())
            .finish()
    }
}

impl StorageQueue {
    /// Lane tasks are spawned on `runtime`, so writes can be enqueued from
    /// threads outside it.
    pub fn new(driver: Arc<dyn PoolDriver>, health: Health, runtime: Handle) -> Self {
        Self {
            inner: Arc::new(Inner {
                driver,
                health,
                runtime,
                lanes: Mutex::new(HashMap::new()),
                pending: AtomicUsize::new(0),
                idle: Notify::new(),
            }),
        }
    }

    pub fn create(&self, kind: EntityKind, id: u64, record: Record) {
        self.enqueue(kind, id, Write::Create(record));
    }

    pub fn update(&self, kind: EntityKind, id: u64, record: Record) {
        self.enqueue(kind, id, Write::Update(record));
    }

    pub fn delete(&self, kind: EntityKind, id: u64) {
        self.enqueue(kind, id, Write::Delete);
    }

    /// Writes enqueued but not yet finished.
    pub fn pending(&self) -> usize {
        self.inner.pending.load(Ordering::SeqCst)
    }

    /// Wait until every enqueued write has finished, successfully or not.
    pub async fn flush(&self) {
        loop {
            let idle = self.inner.idle.notified();
            if self.pending() == 0 {
                return;
            }
            idle.await;
        }
    }

    pub fn enqueue(&self, kind: EntityKind, id: u64, write: Write) {
        let key = (kind, id);
        trace!(%kind, id, op = %write.op(), "enqueue write");
        self.inner.pending.fetch_add(1, Ordering::SeqCst);

        let mut lanes = self.inner.lanes.lock();
        let write = match lanes.get(&key) {
            Some(lane) => match lane.send(write) {
                Ok(()) => return,
                // The lane task has gone; start a fresh lane with the write.
                Err(mpsc::error::SendError(write)) => write,
            },
            None => write,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        // The receiver is alive until the task below drops it.
        let _ = tx.send(write);
        lanes.insert(key, tx);
        drop(lanes);

        let inner = Arc::clone(&self.inner);
        self.inner.runtime.spawn(run_lane(inner, key, rx));
    }
}

async fn run_lane(inner: Arc<Inner>, key: LaneKey, mut rx: mpsc::UnboundedReceiver<Write>) {
    loop {
        let write = match rx.try_recv() {
            Ok(write) => write,
            Err(_) => {
                // Re-check under the lock: an enqueue holding it may have
                // just sent to this lane.
                let mut lanes = inner.lanes.lock();
                match rx.try_recv() {
                    Ok(write) => write,
                    Err(_) => {
                        lanes.remove(&key);
                        return;
                    }
                }
            }
        };

        inner.apply(key, write).await;
        if inner.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            inner.idle.notify_waiters();
        }
    }
}

impl Inner {
    async fn apply(&self, (kind, id): LaneKey, write: Write) {
        let op = write.op();
        let result = match &write {
            Write::Create(record) => self.driver.create(kind, id, record).await,
            Write::Update(record) => self.driver.update(kind, id, record).await,
            Write::Delete => self.driver.delete(kind, id).await,
        };
        match result {
            Ok(()) => debug!(%kind, id, %op, "write applied"),
            Err(e) => {
                self.health.trip(CatalogError::StorageDriver {
                    kind,
                    id,
                    op,
                    cause: e.to_string(),
                });
            }
        }
    }
}
