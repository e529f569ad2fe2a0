//! Snapshot diffs.
//!
//! Every transition replaces the `Arc` of each entity it touches, so an
//! entity changed between two snapshots exactly when its pointer differs.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

/// A pool whose entities can be diffed by pointer identity.
pub trait Snapshot {
    type Id: Copy + Eq + Hash + Ord;
    type Entity;

    fn entities(&self) -> &Arc<HashMap<Self::Id, Arc<Self::Entity>>>;
}

/// IDs that differ between two snapshots, each list sorted ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolDiff<Id> {
    pub added: Vec<Id>,
    pub deleted: Vec<Id>,
    pub changed: Vec<Id>,
}

impl<Id> PoolDiff<Id> {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty() && self.changed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.deleted.len() + self.changed.len()
    }
}

/// Classify every ID present in either snapshot.
pub fn diff<P: Snapshot>(current: &P, previous: &P) -> PoolDiff<P::Id> {
    let now = current.entities();
    let before = previous.entities();
    let mut out = PoolDiff {
        added: Vec::new(),
        deleted: Vec::new(),
        changed: Vec::new(),
    };
    if Arc::ptr_eq(now, before) {
        return out;
    }

    for (id, entity) in now.iter() {
        match before.get(id) {
            None => out.added.push(*id),
            Some(old) if !Arc::ptr_eq(old, entity) => out.changed.push(*id),
            Some(_) => {}
        }
    }
    out.deleted = before
        .keys()
        .filter(|id| !now.contains_key(id))
        .copied()
        .collect();

    out.added.sort_unstable();
    out.deleted.sort_unstable();
    out.changed.sort_unstable();
    out
}
