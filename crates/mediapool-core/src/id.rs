//! Typed identifiers for items, tags, and pooled files.

use std::fmt;
use std::num::NonZeroU64;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error parsing an identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("identifier must be a positive integer, got 0")]
    Zero,

    #[error("not a number: '{0}'")]
    NotANumber(String),

    #[error("file extension must be alphanumeric: '{0}'")]
    BadExtension(String),
}

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "u64", into = "u64")]
        pub struct $name(NonZeroU64);

        impl $name {
            /// Returns `None` for zero.
            pub fn new(value: u64) -> Option<Self> {
                NonZeroU64::new(value).map(Self)
            }

            pub fn get(self) -> u64 {
                self.0.get()
            }

            /// The identifier following this one.
            pub fn next(self) -> Self {
                Self(self.0.saturating_add(1))
            }
        }

        impl TryFrom<u64> for $name {
            type Error = IdError;

            fn try_from(value: u64) -> Result<Self, Self::Error> {
                Self::new(value).ok_or(IdError::Zero)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> u64 {
                id.get()
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let value: u64 = s
                    .trim()
                    .parse()
                    .map_err(|_| IdError::NotANumber(s.to_string()))?;
                Self::try_from(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// Item identifier, assigned sequentially from 1.
    ItemId
);

entity_id!(
    /// Tag identifier, assigned sequentially from 1.
    TagId
);

/// Reference to a file in the file pool: `<number>` or `<number>.<ext>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FileId {
    number: u64,
    extension: Option<String>,
}

impl FileId {
    pub fn new(number: u64) -> Self {
        Self {
            number,
            extension: None,
        }
    }

    pub fn with_extension(number: u64, extension: &str) -> Result<Self, IdError> {
        validate_extension(extension)?;
        Ok(Self {
            number,
            extension: Some(extension.to_string()),
        })
    }

    /// Number allocated by the file pool; decides the bucket directory.
    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }
}

fn validate_extension(extension: &str) -> Result<(), IdError> {
    if extension.is_empty() || !extension.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(IdError::BadExtension(extension.to_string()));
    }
    Ok(())
}

impl FromStr for FileId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (number, extension) = match s.split_once('.') {
            Some((number, extension)) => (number, Some(extension)),
            None => (s, None),
        };
        if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
            return Err(IdError::NotANumber(s.to_string()));
        }
        let number: u64 = number
            .parse()
            .map_err(|_| IdError::NotANumber(s.to_string()))?;
        match extension {
            Some(ext) => Self::with_extension(number, ext),
            None => Ok(Self::new(number)),
        }
    }
}

impl TryFrom<String> for FileId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FileId> for String {
    fn from(id: FileId) -> String {
        id.to_string()
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.extension {
            Some(ext) => write!(f, "{}.{}", self.number, ext),
            None => write!(f, "{}", self.number),
        }
    }
}
