//! Free-form attribute values carried by items and tags.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Number;

use crate::error::{CatalogError, Result};

/// An attribute value: a scalar or a homogeneous array of scalars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Number(Number),
    Text(String),
    TextList(Vec<String>),
    NumberList(Vec<Number>),
    BoolList(Vec<bool>),
}

/// String-keyed attribute map. Ordered so serialized records are stable.
pub type Attributes = BTreeMap<String, AttributeValue>;

impl AttributeValue {
    /// Convert a JSON value, rejecting nulls, objects, and mixed arrays.
    ///
    /// `field` names the attribute in the returned validation error.
    pub fn from_json(field: &str, value: serde_json::Value) -> Result<Self> {
        use serde_json::Value;

        match value {
            Value::Bool(b) => Ok(AttributeValue::Bool(b)),
            Value::Number(n) => Ok(AttributeValue::Number(n)),
            Value::String(s) => Ok(AttributeValue::Text(s)),
            Value::Array(items) => list_from_json(field, items),
            Value::Null => Err(CatalogError::validation(field, "null is not an attribute value")),
            Value::Object(_) => Err(CatalogError::validation(
                field,
                "nested objects are not attribute values",
            )),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            AttributeValue::Bool(_) => "boolean",
            AttributeValue::Number(_) => "number",
            AttributeValue::Text(_) => "string",
            AttributeValue::BoolList(_) => "boolean[]",
            AttributeValue::NumberList(_) => "number[]",
            AttributeValue::TextList(_) => "string[]",
        }
    }
}

fn list_from_json(field: &str, items: Vec<serde_json::Value>) -> Result<AttributeValue> {
    use serde_json::Value;

    let mixed = || CatalogError::validation(field, "array elements must share one scalar type");
    match items.first() {
        None | Some(Value::String(_)) => items
            .into_iter()
            .map(|v| match v {
                Value::String(s) => Ok(s),
                _ => Err(mixed()),
            })
            .collect::<Result<Vec<_>>>()
            .map(AttributeValue::TextList),
        Some(Value::Number(_)) => items
            .into_iter()
            .map(|v| match v {
                Value::Number(n) => Ok(n),
                _ => Err(mixed()),
            })
            .collect::<Result<Vec<_>>>()
            .map(AttributeValue::NumberList),
        Some(Value::Bool(_)) => items
            .into_iter()
            .map(|v| match v {
                Value::Bool(b) => Ok(b),
                _ => Err(mixed()),
            })
            .collect::<Result<Vec<_>>>()
            .map(AttributeValue::BoolList),
        Some(_) => Err(mixed()),
    }
}

/// Build an attribute map from a JSON object.
pub fn attributes_from_json(value: serde_json::Value) -> Result<Attributes> {
    let serde_json::Value::Object(map) = value else {
        return Err(CatalogError::validation("attributes", "expected an object"));
    };
    let mut attributes = Attributes::new();
    for (key, value) in map {
        let field = format!("attributes.{}", key);
        attributes.insert(key, AttributeValue::from_json(&field, value)?);
    }
    validate_attributes(&attributes)?;
    Ok(attributes)
}

/// Attribute keys must be non-empty and free of surrounding whitespace.
pub fn validate_attributes(attributes: &Attributes) -> Result<()> {
    for key in attributes.keys() {
        if key.is_empty() || key.trim() != key {
            return Err(CatalogError::validation(
                format!("attributes.{}", key),
                "attribute keys must be non-empty and trimmed",
            ));
        }
    }
    Ok(())
}
