//! mediapool-store: durable storage for mediapool catalogs.
//!
//! A [`Catalog`] owns the item and tag pools from `mediapool-core` and
//! mirrors every change to disk through a per-entity write queue:
//!
//! - [`pool_storage::JsonFileDriver`] keeps one JSON file per entity in
//!   bucket directories under the store root
//! - [`queue::StorageQueue`] orders writes per entity and latches the first
//!   failure in [`health::Health`]
//! - [`file_pool::FilePool`] stores cover and original blobs and hands out
//!   file numbers

pub mod catalog;
pub mod config;
pub mod driver;
pub mod error;
pub mod file_pool;
pub mod health;
pub mod layout;
pub mod logging;
pub mod pool_storage;
pub mod queue;
pub mod version;

pub use catalog::{Catalog, CatalogStats};
pub use config::{ConfigError, StoreConfig};
pub use driver::{MemoryDriver, PoolDriver, Record};
pub use error::{Result, StoreError};
pub use file_pool::FilePool;
pub use health::Health;
pub use pool_storage::JsonFileDriver;
pub use queue::StorageQueue;
pub use version::SCHEMA_VERSION;
