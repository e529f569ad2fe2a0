//! The item pool: an immutable snapshot of every item plus four sort indexes.
//!
//! Snapshots share structure through `Arc`. A transition clones the pool
//! (cheap: a handful of `Arc` bumps), edits the clone through
//! `Arc::make_mut`, and returns it. The receiver is never touched, so a
//! failed transition simply drops the half-edited clone.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bisect::insert_sorted;
use crate::diff::Snapshot;
use crate::error::{CatalogError, Result};
use crate::filter::{groups_match, FilterGroup};
use crate::id::{FileId, ItemId, TagId};
use crate::item::{dedup_tags, Item, ItemForm, ItemPatch, ItemRecord, Original};
use crate::value::validate_attributes;

/// Which index a listing walks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    Id,
    CreateDate,
    UpdateDate,
    ReleaseDate,
}

impl SortKey {
    pub const ALL: [SortKey; 4] = [
        SortKey::Id,
        SortKey::CreateDate,
        SortKey::UpdateDate,
        SortKey::ReleaseDate,
    ];

    /// Sort value of an item under this key. A missing release date sorts
    /// as zero, i.e. before every dated item from 1970 on.
    pub fn value_of(self, item: &Item) -> i64 {
        match self {
            SortKey::Id => item.id.get() as i64,
            SortKey::CreateDate => item.create_date.timestamp_millis(),
            SortKey::UpdateDate => item.update_date.timestamp_millis(),
            SortKey::ReleaseDate => item.release_date.map_or(0, |d| d.timestamp_millis()),
        }
    }
}

/// Walk direction for listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// A page request against an index.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub sort: SortKey,
    /// Start after this ID (exclusive). `None` starts at the end the
    /// direction begins from.
    pub after: Option<ItemId>,
    pub direction: Direction,
    /// Maximum number of results; 0 means unbounded.
    pub limit: usize,
    pub filter: Vec<FilterGroup>,
}

/// Sorted ID lists, one per [`SortKey`].
#[derive(Debug, Clone, Default)]
struct ItemIndex {
    by_id: Arc<Vec<ItemId>>,
    by_create_date: Arc<Vec<ItemId>>,
    by_update_date: Arc<Vec<ItemId>>,
    by_release_date: Arc<Vec<ItemId>>,
}

impl ItemIndex {
    fn get(&self, key: SortKey) -> &Arc<Vec<ItemId>> {
        match key {
            SortKey::Id => &self.by_id,
            SortKey::CreateDate => &self.by_create_date,
            SortKey::UpdateDate => &self.by_update_date,
            SortKey::ReleaseDate => &self.by_release_date,
        }
    }

    fn get_mut(&mut self, key: SortKey) -> &mut Vec<ItemId> {
        let list = match key {
            SortKey::Id => &mut self.by_id,
            SortKey::CreateDate => &mut self.by_create_date,
            SortKey::UpdateDate => &mut self.by_update_date,
            SortKey::ReleaseDate => &mut self.by_release_date,
        };
        Arc::make_mut(list)
    }
}

/// Immutable snapshot of all items.
#[derive(Debug, Clone, Default)]
pub struct ItemPool {
    latest_id: u64,
    items: Arc<HashMap<ItemId, Arc<Item>>>,
    index: ItemIndex,
}

impl ItemPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a pool from records read at start-up.
    ///
    /// Indexes are sorted once here; ties fall back to ID order.
    pub fn from_records(records: Vec<ItemRecord>) -> Result<Self> {
        let mut items = HashMap::with_capacity(records.len());
        let mut latest_id = 0;
        for record in records {
            let item = Item::from_record(record)?;
            latest_id = latest_id.max(item.id.get());
            if items.insert(item.id, Arc::new(item)).is_some() {
                return Err(CatalogError::validation("id", "duplicate item id in records"));
            }
        }

        let mut pool = Self {
            latest_id,
            items: Arc::new(items),
            index: ItemIndex::default(),
        };
        for key in SortKey::ALL {
            let mut list: Vec<ItemId> = pool.items.keys().copied().collect();
            list.sort_by_key(|id| (key.value_of(&pool.items[id]), *id));
            *pool.index.get_mut(key) = list;
        }
        pool.warn_on_broken_links();
        tracing::debug!(items = pool.len(), latest_id, "item pool hydrated");
        Ok(pool)
    }

    fn warn_on_broken_links(&self) {
        for item in self.items.values() {
            if let Some(parent) = item.parent {
                let listed = self
                    .items
                    .get(&parent)
                    .is_some_and(|p| p.children().contains(&item.id));
                if !listed {
                    tracing::warn!(item = %item.id, parent = %parent, "child not listed by its parent");
                }
            }
            for child in item.children() {
                if self.items.get(child).and_then(|c| c.parent) != Some(item.id) {
                    tracing::warn!(item = %item.id, child = %child, "listed child does not point back");
                }
            }
        }
    }

    pub fn latest_id(&self) -> u64 {
        self.latest_id
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: ItemId) -> Result<&Arc<Item>> {
        self.items.get(&id).ok_or_else(|| CatalogError::item_not_found(id))
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.items.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Item>> {
        self.items.values()
    }

    /// IDs in the order of the given index.
    pub fn index(&self, key: SortKey) -> &[ItemId] {
        self.index.get(key)
    }

    /// Every file referenced by a cover or a single-file original.
    pub fn referenced_files(&self) -> HashSet<FileId> {
        self.items
            .values()
            .flat_map(|item| item.referenced_files().cloned())
            .collect()
    }

    /// True when every index is a permutation of the key set and sorted.
    pub fn index_is_consistent(&self) -> bool {
        SortKey::ALL.iter().all(|&key| {
            let list = self.index.get(key);
            let unique: HashSet<&ItemId> = list.iter().collect();
            let permutation = list.len() == self.items.len()
                && unique.len() == list.len()
                && list.iter().all(|id| self.items.contains_key(id));
            // update_date order is arrival order, not timestamp order
            permutation
                && (key == SortKey::UpdateDate
                    || list.windows(2).all(|w| {
                        key.value_of(&self.items[&w[0]]) <= key.value_of(&self.items[&w[1]])
                    }))
        })
    }

    /// Create an item from a form. Returns the new item and the next pool.
    pub fn create(&self, form: ItemForm, now: DateTime<Utc>) -> Result<(Arc<Item>, ItemPool)> {
        let id = ItemId::new(self.latest_id + 1)
            .ok_or_else(|| CatalogError::validation("id", "item id space exhausted"))?;
        validate_attributes(&form.attributes)?;
        if let Some(Original::Children(children)) = &form.original {
            self.validate_children(id, children)?;
        }

        let item = Item {
            id,
            title: form.title,
            attributes: form.attributes,
            cover: form.cover,
            original: form.original,
            cover_width: form.cover_width,
            cover_height: form.cover_height,
            tags: dedup_tags(form.tags),
            parent: None,
            release_date: form.release_date,
            create_date: now,
            update_date: now,
        };

        let mut next = self.clone();
        next.latest_id = id.get();
        let children = item.children().to_vec();
        let item = next.put(item);
        Arc::make_mut(&mut next.index.by_id).push(id);
        next.index_sorted(SortKey::CreateDate, id);
        Arc::make_mut(&mut next.index.by_update_date).push(id);
        next.index_sorted(SortKey::ReleaseDate, id);
        for child in children {
            next.set_parent(child, Some(id), now)?;
        }
        Ok((item, next))
    }

    /// Apply a partial update.
    pub fn update(&self, id: ItemId, patch: ItemPatch, now: DateTime<Utc>) -> Result<ItemPool> {
        if patch.parent.is_some() {
            return Err(CatalogError::ForbiddenMutation {
                id: id.get(),
                field: "parent".into(),
            });
        }
        let current = self.get(id)?;
        let mut item = Item::clone(current);
        let mut next = self.clone();

        if let Some(title) = patch.title {
            item.title = title;
        }
        if let Some(attributes) = patch.attributes {
            validate_attributes(&attributes)?;
            item.attributes = attributes;
        }
        if let Some(cover) = patch.cover {
            item.cover = cover;
        }
        if let Some(width) = patch.cover_width {
            item.cover_width = width;
        }
        if let Some(height) = patch.cover_height {
            item.cover_height = height;
        }
        if let Some(tags) = patch.tags {
            item.tags = dedup_tags(tags);
        }
        let release_changed = match patch.release_date {
            Some(release) if release != item.release_date => {
                item.release_date = release;
                true
            }
            _ => false,
        };
        if let Some(original) = patch.original {
            let new_children: &[ItemId] = match &original {
                Some(Original::Children(children)) => {
                    if item.parent.is_some() {
                        return Err(CatalogError::validation(
                            "original",
                            "a child item cannot list children of its own",
                        ));
                    }
                    self.validate_children(id, children)?;
                    children
                }
                _ => &[],
            };
            for old in current.children() {
                if !new_children.contains(old) {
                    next.set_parent(*old, None, now)?;
                }
            }
            for child in new_children {
                if next.get(*child)?.parent != Some(id) {
                    next.set_parent(*child, Some(id), now)?;
                }
            }
            item.original = original;
        }

        item.update_date = now;
        next.put(item);
        next.move_to_update_tail(id);
        if release_changed {
            next.reinsert(SortKey::ReleaseDate, id);
        }
        Ok(next)
    }

    /// Remove an item that is neither a child nor a non-empty parent.
    pub fn delete(&self, id: ItemId) -> Result<ItemPool> {
        let item = self.get(id)?;
        if let Some(parent) = item.parent {
            return Err(CatalogError::HasDependents {
                id: id.get(),
                reason: format!("item is a child of {}", parent),
            });
        }
        if item.is_parent() {
            return Err(CatalogError::HasDependents {
                id: id.get(),
                reason: format!("item still lists {} children", item.children().len()),
            });
        }

        let mut next = self.clone();
        Arc::make_mut(&mut next.items).remove(&id);
        for key in SortKey::ALL {
            next.index.get_mut(key).retain(|other| *other != id);
        }
        Ok(next)
    }

    /// Strip a tag from every item carrying it. Returns how many items changed.
    pub fn remove_tag(&self, tag: TagId, now: DateTime<Utc>) -> (usize, ItemPool) {
        let mut next = self.clone();
        let carriers: Vec<ItemId> = self
            .items
            .values()
            .filter(|item| item.tags.contains(&tag))
            .map(|item| item.id)
            .collect();
        for id in &carriers {
            let mut item = Item::clone(&self.items[id]);
            item.tags.retain(|t| *t != tag);
            item.update_date = now;
            next.put(item);
            next.move_to_update_tail(*id);
        }
        (carriers.len(), next)
    }

    /// Page through an index, keeping only items that pass `query.filter`.
    pub fn list(&self, query: &ListQuery) -> Result<Vec<Arc<Item>>> {
        let list = self.index.get(query.sort);
        let start = match query.after {
            Some(after) => Some(
                list.iter()
                    .position(|id| *id == after)
                    .ok_or(CatalogError::CursorNotFound(after.get()))?,
            ),
            None => None,
        };
        let page = match (query.direction, start) {
            (Direction::Asc, Some(at)) => self.collect_page(list[at + 1..].iter(), query),
            (Direction::Asc, None) => self.collect_page(list.iter(), query),
            (Direction::Desc, Some(at)) => self.collect_page(list[..at].iter().rev(), query),
            (Direction::Desc, None) => self.collect_page(list.iter().rev(), query),
        };
        Ok(page)
    }

    fn collect_page<'a>(
        &self,
        ids: impl Iterator<Item = &'a ItemId>,
        query: &ListQuery,
    ) -> Vec<Arc<Item>> {
        let limit = if query.limit == 0 { usize::MAX } else { query.limit };
        ids.filter_map(|id| self.items.get(id))
            .filter(|item| groups_match(&query.filter, item))
            .take(limit)
            .cloned()
            .collect()
    }

    fn validate_children(&self, parent: ItemId, children: &[ItemId]) -> Result<()> {
        if children.is_empty() {
            return Err(CatalogError::validation(
                "original",
                "a children list must not be empty",
            ));
        }
        let mut seen = HashSet::with_capacity(children.len());
        for child in children {
            if *child == parent {
                return Err(CatalogError::SelfReference(parent.get()));
            }
            if !seen.insert(*child) {
                return Err(CatalogError::validation(
                    "original",
                    format!("child {} is listed twice", child),
                ));
            }
            let item = self.get(*child)?;
            if item.is_parent() {
                return Err(CatalogError::validation(
                    "original",
                    format!("item {} is itself a parent", child),
                ));
            }
            if let Some(other) = item.parent.filter(|p| *p != parent) {
                return Err(CatalogError::validation(
                    "original",
                    format!("item {} already belongs to {}", child, other),
                ));
            }
        }
        Ok(())
    }

    fn put(&mut self, item: Item) -> Arc<Item> {
        let item = Arc::new(item);
        Arc::make_mut(&mut self.items).insert(item.id, Arc::clone(&item));
        item
    }

    fn set_parent(&mut self, child: ItemId, parent: Option<ItemId>, now: DateTime<Utc>) -> Result<()> {
        let mut item = Item::clone(self.get(child)?);
        item.parent = parent;
        item.update_date = now;
        self.put(item);
        self.move_to_update_tail(child);
        Ok(())
    }

    fn move_to_update_tail(&mut self, id: ItemId) {
        let list = self.index.get_mut(SortKey::UpdateDate);
        list.retain(|other| *other != id);
        list.push(id);
    }

    fn index_sorted(&mut self, key: SortKey, id: ItemId) {
        let items = Arc::clone(&self.items);
        let value_of = |id: &ItemId| items.get(id).map_or(0, |item| key.value_of(item));
        insert_sorted(self.index.get_mut(key), id, value_of);
    }

    fn reinsert(&mut self, key: SortKey, id: ItemId) {
        self.index.get_mut(key).retain(|other| *other != id);
        self.index_sorted(key, id);
    }
}

impl Snapshot for ItemPool {
    type Id = ItemId;
    type Entity = Item;

    fn entities(&self) -> &Arc<HashMap<ItemId, Arc<Item>>> {
        &self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{FilterRule, Logic, RuleKind};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn id(n: u64) -> ItemId {
        ItemId::new(n).unwrap()
    }

    fn titled(title: &str) -> ItemForm {
        ItemForm {
            title: title.into(),
            ..Default::default()
        }
    }

    fn pool_with(titles: &[&str]) -> ItemPool {
        let mut pool = ItemPool::new();
        for (i, title) in titles.iter().enumerate() {
            let (_, next) = pool.create(titled(title), t0() + Duration::seconds(i as i64)).unwrap();
            pool = next;
        }
        pool
    }

    #[test]
    fn create_assigns_sequential_ids() {
        let pool = pool_with(&["a", "b", "c"]);
        assert_eq!(pool.latest_id(), 3);
        assert_eq!(pool.index(SortKey::Id), &[id(1), id(2), id(3)]);
        assert_eq!(pool.get(id(2)).unwrap().title, "b");
        assert!(pool.index_is_consistent());
    }

    #[test]
    fn create_does_not_touch_the_receiver() {
        let before = pool_with(&["a"]);
        let (_, after) = before.create(titled("b"), t0()).unwrap();
        assert_eq!(before.len(), 1);
        assert_eq!(after.len(), 2);
    }

    #[test]
    fn create_parent_links_children() {
        let pool = pool_with(&["c1", "c2"]);
        let form = ItemForm {
            title: "album".into(),
            original: Some(Original::Children(vec![id(1), id(2)])),
            ..Default::default()
        };
        let (parent, pool) = pool.create(form, t0()).unwrap();
        assert_eq!(pool.get(id(1)).unwrap().parent, Some(parent.id));
        assert_eq!(pool.get(id(2)).unwrap().parent, Some(parent.id));
        assert!(matches!(
            pool.delete(id(1)),
            Err(CatalogError::HasDependents { id: 1, .. })
        ));
        assert!(matches!(
            pool.delete(parent.id),
            Err(CatalogError::HasDependents { .. })
        ));
    }

    #[test]
    fn create_rejects_self_and_missing_children() {
        let pool = pool_with(&["c1"]);
        let listing_self = ItemForm {
            original: Some(Original::Children(vec![id(2)])),
            ..Default::default()
        };
        assert_eq!(
            pool.create(listing_self, t0()).unwrap_err(),
            CatalogError::SelfReference(2)
        );
        let missing = ItemForm {
            original: Some(Original::Children(vec![id(9)])),
            ..Default::default()
        };
        assert_eq!(
            pool.create(missing, t0()).unwrap_err(),
            CatalogError::item_not_found(9u64)
        );
    }

    #[test]
    fn child_cannot_join_a_second_parent() {
        let pool = pool_with(&["c1"]);
        let group = |children| ItemForm {
            original: Some(Original::Children(children)),
            ..Default::default()
        };
        let (_, pool) = pool.create(group(vec![id(1)]), t0()).unwrap();
        let err = pool.create(group(vec![id(1)]), t0()).unwrap_err();
        assert!(matches!(err, CatalogError::Validation { ref field, .. } if field == "original"));
    }

    #[test]
    fn setting_parent_is_forbidden() {
        let pool = pool_with(&["a"]);
        let patch = ItemPatch {
            parent: Some(None),
            ..Default::default()
        };
        assert_eq!(
            pool.update(id(1), patch, t0()).unwrap_err(),
            CatalogError::ForbiddenMutation {
                id: 1,
                field: "parent".into()
            }
        );
    }

    #[test]
    fn replacing_children_relinks() {
        let pool = pool_with(&["c1", "c2", "c3"]);
        let form = ItemForm {
            original: Some(Original::Children(vec![id(1), id(2)])),
            ..Default::default()
        };
        let (parent, pool) = pool.create(form, t0()).unwrap();

        let patch = ItemPatch {
            original: Some(Some(Original::Children(vec![id(2), id(3)]))),
            ..Default::default()
        };
        let pool = pool.update(parent.id, patch, t0()).unwrap();
        assert_eq!(pool.get(id(1)).unwrap().parent, None);
        assert_eq!(pool.get(id(2)).unwrap().parent, Some(parent.id));
        assert_eq!(pool.get(id(3)).unwrap().parent, Some(parent.id));

        let clear = ItemPatch {
            original: Some(None),
            ..Default::default()
        };
        let pool = pool.update(parent.id, clear, t0()).unwrap();
        assert!(pool.iter().all(|item| item.parent.is_none()));
        assert!(pool.delete(id(2)).is_ok());
        assert!(pool.delete(parent.id).is_ok());
    }

    #[test]
    fn update_moves_item_to_update_tail() {
        let pool = pool_with(&["a", "b", "c"]);
        let patch = ItemPatch {
            title: Some("A".into()),
            ..Default::default()
        };
        let later = t0() + Duration::hours(1);
        let pool = pool.update(id(1), patch, later).unwrap();
        assert_eq!(pool.index(SortKey::UpdateDate), &[id(2), id(3), id(1)]);
        assert_eq!(pool.get(id(1)).unwrap().update_date, later);
        assert!(pool.index_is_consistent());
    }

    #[test]
    fn release_date_reindexes_with_nulls_first() {
        let pool = pool_with(&["a", "b", "c"]);
        let date = |y| Some(Some(Utc.with_ymd_and_hms(y, 1, 1, 0, 0, 0).unwrap()));
        let pool = pool
            .update(id(1), ItemPatch { release_date: date(2020), ..Default::default() }, t0())
            .unwrap();
        let pool = pool
            .update(id(3), ItemPatch { release_date: date(2010), ..Default::default() }, t0())
            .unwrap();
        assert_eq!(pool.index(SortKey::ReleaseDate), &[id(2), id(3), id(1)]);
        assert!(pool.index_is_consistent());
    }

    #[test]
    fn failed_update_leaves_pool_untouched() {
        let pool = pool_with(&["a"]);
        let patch = ItemPatch {
            title: Some("changed".into()),
            original: Some(Some(Original::Children(vec![id(7)]))),
            ..Default::default()
        };
        assert!(pool.update(id(1), patch, t0()).is_err());
        assert_eq!(pool.get(id(1)).unwrap().title, "a");
    }

    #[test]
    fn delete_removes_from_every_index() {
        let pool = pool_with(&["a", "b", "c"]);
        let pool = pool.delete(id(2)).unwrap();
        for key in SortKey::ALL {
            assert_eq!(pool.index(key).len(), 2, "{:?}", key);
        }
        assert!(pool.index_is_consistent());
        assert_eq!(pool.latest_id(), 3);
        assert!(matches!(pool.delete(id(2)), Err(CatalogError::NotFound { .. })));
    }

    #[test]
    fn list_pages_with_cursor_and_filter() {
        let pool = pool_with(&["red one", "blue", "red two", "red three", "green"]);
        let red = vec![FilterGroup::new(vec![FilterRule::new(
            RuleKind::TitleContains("red".into()),
        )])];

        let first = pool
            .list(&ListQuery { limit: 2, filter: red.clone(), ..Default::default() })
            .unwrap();
        let ids: Vec<ItemId> = first.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![id(1), id(3)]);

        let second = pool
            .list(&ListQuery { after: Some(id(3)), limit: 2, filter: red, ..Default::default() })
            .unwrap();
        let ids: Vec<ItemId> = second.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![id(4)]);
    }

    #[test]
    fn list_descending_from_cursor() {
        let pool = pool_with(&["a", "b", "c", "d"]);
        let page = pool
            .list(&ListQuery {
                sort: SortKey::CreateDate,
                after: Some(id(3)),
                direction: Direction::Desc,
                ..Default::default()
            })
            .unwrap();
        let ids: Vec<ItemId> = page.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![id(2), id(1)]);
    }

    #[test]
    fn list_unknown_cursor_fails() {
        let pool = pool_with(&["a"]);
        let query = ListQuery {
            after: Some(id(5)),
            ..Default::default()
        };
        assert_eq!(pool.list(&query).unwrap_err(), CatalogError::CursorNotFound(5));
    }

    #[test]
    fn remove_tag_touches_only_carriers() {
        let tag = TagId::new(1).unwrap();
        let mut pool = ItemPool::new();
        for tags in [vec![tag], vec![], vec![tag]] {
            let form = ItemForm { tags, ..Default::default() };
            pool = pool.create(form, t0()).unwrap().1;
        }
        let (changed, next) = pool.remove_tag(tag, t0());
        assert_eq!(changed, 2);
        assert!(next.iter().all(|item| item.tags.is_empty()));
        assert!(Arc::ptr_eq(pool.get(id(2)).unwrap(), next.get(id(2)).unwrap()));
    }

    #[test]
    fn from_records_rebuilds_indexes() {
        let pool = pool_with(&["a", "b", "c"]);
        let records: Vec<ItemRecord> = pool.iter().map(|item| item.to_record()).collect();
        let restored = ItemPool::from_records(records).unwrap();
        assert_eq!(restored.latest_id(), 3);
        assert_eq!(restored.index(SortKey::Id), pool.index(SortKey::Id));
        assert_eq!(restored.index(SortKey::CreateDate), pool.index(SortKey::CreateDate));
        assert!(restored.index_is_consistent());
    }

    #[test]
    fn referenced_files_cover_and_single_original() {
        let form = ItemForm {
            cover: Some("1".parse().unwrap()),
            original: Some(Original::File("2.mkv".parse().unwrap())),
            ..Default::default()
        };
        let (_, pool) = ItemPool::new().create(form, t0()).unwrap();
        let files = pool.referenced_files();
        assert!(files.contains(&"1".parse().unwrap()));
        assert!(files.contains(&"2.mkv".parse().unwrap()));
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn multi_child_rule_sees_parents() {
        let pool = pool_with(&["c1", "c2"]);
        let form = ItemForm {
            original: Some(Original::Children(vec![id(1), id(2)])),
            ..Default::default()
        };
        let (_, pool) = pool.create(form, t0()).unwrap();
        let parents = vec![FilterGroup::new(vec![FilterRule::new(RuleKind::MultiChildParent)])];
        let children = vec![FilterGroup::new(vec![
            FilterRule::new(RuleKind::Child).with_logic(Logic::And),
        ])];
        let q = |filter| ListQuery { filter, ..Default::default() };
        assert_eq!(pool.list(&q(parents)).unwrap().len(), 1);
        assert_eq!(pool.list(&q(children)).unwrap().len(), 2);
    }
}
