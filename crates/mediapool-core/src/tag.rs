//! Core tag types.

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::error::{CatalogError, Result};
use crate::id::TagId;
use crate::value::Attributes;

/// A label attached to items. Stored on disk as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    #[serde(default)]
    pub attributes: Attributes,
}

/// Fields accepted when creating a tag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagForm {
    pub name: String,
    pub attributes: Attributes,
}

/// Partial update of a tag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagPatch {
    pub name: Option<String>,
    pub attributes: Option<Attributes>,
}

/// Trim a tag name and reject it when nothing is left.
pub fn clean_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CatalogError::validation("name", "tag name must not be empty"));
    }
    Ok(trimmed.to_string())
}

/// Comparison key for tag names: compatibility-normalized, then lowercased,
/// so "Ｆｏｏ", "FOO" and "foo" collide.
pub fn fold_name(name: &str) -> String {
    name.trim().nfkc().collect::<String>().to_lowercase()
}
