//! The tag pool: tags by ID, a folded-name lookup table, and a name index.

use std::collections::HashMap;
use std::sync::Arc;

use crate::bisect::insert_sorted;
use crate::diff::Snapshot;
use crate::error::{CatalogError, Result};
use crate::id::TagId;
use crate::item_pool::Direction;
use crate::tag::{clean_name, fold_name, Tag, TagForm, TagPatch};
use crate::value::validate_attributes;

/// Immutable snapshot of all tags.
///
/// `names` maps the folded name of every tag to its ID; it always holds
/// exactly one entry per tag.
#[derive(Debug, Clone, Default)]
pub struct TagPool {
    latest_id: u64,
    tags: Arc<HashMap<TagId, Arc<Tag>>>,
    names: Arc<HashMap<String, TagId>>,
    by_name: Arc<Vec<TagId>>,
}

/// A page request against the name index.
#[derive(Debug, Clone, Default)]
pub struct TagQuery {
    pub after: Option<TagId>,
    pub direction: Direction,
    /// 0 means unbounded.
    pub limit: usize,
    /// Case-insensitive substring the name must contain.
    pub name_contains: Option<String>,
}

impl TagPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a pool from tags read at start-up.
    pub fn from_records(records: Vec<Tag>) -> Result<Self> {
        let mut pool = Self::new();
        let mut tags = HashMap::with_capacity(records.len());
        let mut names = HashMap::with_capacity(records.len());
        for tag in records {
            pool.latest_id = pool.latest_id.max(tag.id.get());
            if names.insert(fold_name(&tag.name), tag.id).is_some() {
                return Err(CatalogError::DuplicateName(tag.name));
            }
            if tags.insert(tag.id, Arc::new(tag)).is_some() {
                return Err(CatalogError::validation("id", "duplicate tag id in records"));
            }
        }
        let mut by_name: Vec<TagId> = tags.keys().copied().collect();
        by_name.sort_by_cached_key(|id| (fold_name(&tags[id].name), *id));

        pool.tags = Arc::new(tags);
        pool.names = Arc::new(names);
        pool.by_name = Arc::new(by_name);
        tracing::debug!(tags = pool.len(), latest_id = pool.latest_id, "tag pool hydrated");
        Ok(pool)
    }

    pub fn latest_id(&self) -> u64 {
        self.latest_id
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn get(&self, id: TagId) -> Result<&Arc<Tag>> {
        self.tags.get(&id).ok_or_else(|| CatalogError::tag_not_found(id))
    }

    pub fn contains(&self, id: TagId) -> bool {
        self.tags.contains_key(&id)
    }

    /// Case-insensitive lookup.
    pub fn find_by_name(&self, name: &str) -> Option<&Arc<Tag>> {
        self.names
            .get(&fold_name(name))
            .and_then(|id| self.tags.get(id))
    }

    /// IDs sorted by folded name.
    pub fn index(&self) -> &[TagId] {
        &self.by_name
    }

    pub fn create(&self, form: TagForm) -> Result<(Arc<Tag>, TagPool)> {
        let name = clean_name(&form.name)?;
        validate_attributes(&form.attributes)?;
        let folded = fold_name(&name);
        if self.names.contains_key(&folded) {
            return Err(CatalogError::DuplicateName(name));
        }
        let id = TagId::new(self.latest_id + 1)
            .ok_or_else(|| CatalogError::validation("id", "tag id space exhausted"))?;

        let tag = Arc::new(Tag {
            id,
            name,
            attributes: form.attributes,
        });
        let mut next = self.clone();
        next.latest_id = id.get();
        Arc::make_mut(&mut next.tags).insert(id, Arc::clone(&tag));
        Arc::make_mut(&mut next.names).insert(folded, id);
        next.index_by_name(id);
        Ok((tag, next))
    }

    pub fn update(&self, id: TagId, patch: TagPatch) -> Result<TagPool> {
        let mut tag = Tag::clone(self.get(id)?);
        let mut next = self.clone();

        if let Some(name) = patch.name {
            let name = clean_name(&name)?;
            let old_folded = fold_name(&tag.name);
            let new_folded = fold_name(&name);
            if new_folded != old_folded {
                if self.names.contains_key(&new_folded) {
                    return Err(CatalogError::DuplicateName(name));
                }
                let names = Arc::make_mut(&mut next.names);
                names.remove(&old_folded);
                names.insert(new_folded, id);
            }
            tag.name = name;
        }
        if let Some(attributes) = patch.attributes {
            validate_attributes(&attributes)?;
            tag.attributes = attributes;
        }

        Arc::make_mut(&mut next.tags).insert(id, Arc::new(tag));
        Arc::make_mut(&mut next.by_name).retain(|other| *other != id);
        next.index_by_name(id);
        Ok(next)
    }

    /// Remove a tag. Items still carrying it are the caller's concern.
    pub fn delete(&self, id: TagId) -> Result<TagPool> {
        let tag = self.get(id)?;
        let mut next = self.clone();
        Arc::make_mut(&mut next.names).remove(&fold_name(&tag.name));
        Arc::make_mut(&mut next.tags).remove(&id);
        Arc::make_mut(&mut next.by_name).retain(|other| *other != id);
        Ok(next)
    }

    pub fn list(&self, query: &TagQuery) -> Result<Vec<Arc<Tag>>> {
        let list: &[TagId] = &self.by_name;
        let start = match query.after {
            Some(after) => Some(
                list.iter()
                    .position(|id| *id == after)
                    .ok_or(CatalogError::CursorNotFound(after.get()))?,
            ),
            None => None,
        };
        let needle = query.name_contains.as_deref().map(fold_name);
        let limit = if query.limit == 0 { usize::MAX } else { query.limit };
        let keep = |tag: &&Arc<Tag>| {
            needle
                .as_deref()
                .map_or(true, |n| fold_name(&tag.name).contains(n))
        };
        let ids: Box<dyn Iterator<Item = &TagId>> = match (query.direction, start) {
            (Direction::Asc, Some(at)) => Box::new(list[at + 1..].iter()),
            (Direction::Asc, None) => Box::new(list.iter()),
            (Direction::Desc, Some(at)) => Box::new(list[..at].iter().rev()),
            (Direction::Desc, None) => Box::new(list.iter().rev()),
        };
        Ok(ids
            .filter_map(|id| self.tags.get(id))
            .filter(keep)
            .take(limit)
            .cloned()
            .collect())
    }

    fn index_by_name(&mut self, id: TagId) {
        let tags = Arc::clone(&self.tags);
        let key = |id: &TagId| tags.get(id).map(|t| fold_name(&t.name)).unwrap_or_default();
        insert_sorted(Arc::make_mut(&mut self.by_name), id, key);
    }
}

impl Snapshot for TagPool {
    type Id = TagId;
    type Entity = Tag;

    fn entities(&self) -> &Arc<HashMap<TagId, Arc<Tag>>> {
        &self.tags
    }
}
