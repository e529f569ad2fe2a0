//! mediapool-core: in-memory item and tag pools.
//!
//! Pools are immutable snapshots. Every mutation is a state transition
//! `(pool, args) -> pool'` or `(pool, args) -> (entity, pool')`, applied
//! through a single-writer [`PoolCell`] that hands the previous and current
//! snapshots to an observer. The observer diffs them ([`diff`]) to decide
//! what must be written to durable storage.

pub mod bisect;
pub mod cell;
pub mod diff;
pub mod error;
pub mod filter;
pub mod id;
pub mod item;
pub mod item_pool;
pub mod tag;
pub mod tag_pool;
pub mod value;

pub use cell::*;
pub use diff::*;
pub use error::*;
pub use filter::*;
pub use id::*;
pub use item::*;
pub use item_pool::*;
pub use tag::*;
pub use tag_pool::*;
pub use value::*;
