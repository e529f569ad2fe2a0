use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{CatalogError, Result};
use crate::id::{FileId, ItemId, TagId};
use crate::value::Attributes;

/// What an item's `original` points at.
///
/// An item with `Children` is a parent; each listed child points back at it
/// through its own `parent` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Original {
    File(FileId),
    Children(Vec<ItemId>),
}

/// A media record.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: ItemId,
    pub title: String,
    pub attributes: Attributes,
    pub cover: Option<FileId>,
    pub original: Option<Original>,
    pub cover_width: u32,
    pub cover_height: u32,
    pub tags: Vec<TagId>,
    pub parent: Option<ItemId>,
    pub release_date: Option<DateTime<Utc>>,
    pub create_date: DateTime<Utc>,
    pub update_date: DateTime<Utc>,
}

impl Item {
    /// Child IDs when this item is a parent, otherwise empty.
    pub fn children(&self) -> &[ItemId] {
        match &self.original {
            Some(Original::Children(children)) => children,
            _ => &[],
        }
    }

    pub fn is_parent(&self) -> bool {
        !self.children().is_empty()
    }

    pub fn is_child(&self) -> bool {
        self.parent.is_some()
    }

    /// Files this item keeps alive in the file pool.
    ///
    /// Parents contribute nothing through `original`; their children carry
    /// the file references.
    pub fn referenced_files(&self) -> impl Iterator<Item = &FileId> {
        let original = match &self.original {
            Some(Original::File(file)) => Some(file),
            _ => None,
        };
        self.cover.iter().chain(original)
    }

    pub fn to_record(&self) -> ItemRecord {
        ItemRecord {
            id: self.id.get(),
            title: self.title.clone(),
            attributes: self.attributes.clone(),
            cover: self.cover.clone(),
            original: self.original.clone(),
            cover_width: self.cover_width,
            cover_height: self.cover_height,
            tags: self.tags.clone(),
            parent: self.parent,
            release_date: self.release_date.map(|d| d.to_rfc3339()),
            create_date: self.create_date.to_rfc3339(),
            update_date: self.update_date.to_rfc3339(),
        }
    }

    /// Hydrate a record read from disk.
    pub fn from_record(record: ItemRecord) -> Result<Self> {
        let id = ItemId::new(record.id)
            .ok_or_else(|| CatalogError::validation("id", "item id must be positive"))?;
        let release_date = record
            .release_date
            .as_deref()
            .map(|s| parse_date("release_date", s))
            .transpose()?;
        Ok(Self {
            id,
            title: record.title,
            attributes: record.attributes,
            cover: record.cover,
            original: record.original,
            cover_width: record.cover_width,
            cover_height: record.cover_height,
            tags: record.tags,
            parent: record.parent,
            release_date,
            create_date: parse_date("create_date", &record.create_date)?,
            update_date: parse_date("update_date", &record.update_date)?,
        })
    }
}

fn parse_date(field: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| CatalogError::validation(field, format!("invalid ISO-8601 date '{}': {}", value, e)))
}

/// On-disk shape of an item. Dates are ISO-8601 strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub attributes: Attributes,
    pub cover: Option<FileId>,
    pub original: Option<Original>,
    #[serde(default)]
    pub cover_width: u32,
    #[serde(default)]
    pub cover_height: u32,
    #[serde(default)]
    pub tags: Vec<TagId>,
    pub parent: Option<ItemId>,
    pub release_date: Option<String>,
    pub create_date: String,
    pub update_date: String,
}

/// Fields accepted when creating an item.
///
/// There is no `parent`: a child gets its parent when the parent lists it
/// in `original`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemForm {
    pub title: String,
    pub attributes: Attributes,
    pub cover: Option<FileId>,
    pub original: Option<Original>,
    pub cover_width: u32,
    pub cover_height: u32,
    pub tags: Vec<TagId>,
    pub release_date: Option<DateTime<Utc>>,
}

/// Partial update of an item. `None` leaves a field unchanged.
///
/// For nullable fields the inner `Option` is the new value, so
/// `cover: Some(None)` clears the cover. `parent` is accepted only so that
/// an attempt to set it can be rejected.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ItemPatch {
    pub title: Option<String>,
    pub attributes: Option<Attributes>,
    #[serde(deserialize_with = "double_option")]
    pub cover: Option<Option<FileId>>,
    #[serde(deserialize_with = "double_option")]
    pub original: Option<Option<Original>>,
    pub cover_width: Option<u32>,
    pub cover_height: Option<u32>,
    pub tags: Option<Vec<TagId>>,
    #[serde(deserialize_with = "double_option")]
    pub parent: Option<Option<ItemId>>,
    #[serde(deserialize_with = "double_option")]
    pub release_date: Option<Option<DateTime<Utc>>>,
}

/// Distinguishes an explicit `null` (`Some(None)`) from an absent key (`None`).
fn double_option<'de, T, D>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Drop repeated tag IDs, keeping first occurrences in order.
pub fn dedup_tags(tags: Vec<TagId>) -> Vec<TagId> {
    let mut seen = std::collections::HashSet::with_capacity(tags.len());
    tags.into_iter().filter(|t| seen.insert(*t)).collect()
}
