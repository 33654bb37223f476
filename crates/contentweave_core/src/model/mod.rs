//! Identity and value model for collated content.
//!
//! # Responsibility
//! - Define addressing keys (`Address`, `VersionedAddress`) and identities
//!   (`ItemId`, `ItemVersionedId`).
//! - Define the persisted `Container` record and the logical `Content` object.
//! - Provide dotted property paths over JSON content.
//!
//! # Invariants
//! - Identity values are never constructed from empty ids or type names.
//! - Address equality ignores segment insertion order and value casing.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod address;
pub mod container;
pub mod content;
pub mod item_id;
pub mod property_path;
pub mod version;

/// Fully qualified logical type name, e.g. `MyNs.Article`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeName(String);

impl TypeName {
    /// Creates a type name, rejecting blank input.
    pub fn new(name: impl Into<String>) -> Result<Self, ModelError> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(ModelError::InvalidArgument(
                "type name cannot be empty".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Short name after the last namespace dot.
    pub fn short_name(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(self.0.as_str())
    }
}

impl Display for TypeName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeName {
    fn from(value: &str) -> Self {
        Self(value.trim().to_string())
    }
}

impl AsRef<str> for TypeName {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

/// Errors raised while building or parsing model values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// Required input is empty or missing.
    InvalidArgument(String),
    /// Serialized identifier or address string is malformed.
    Format(String),
}

impl Display for ModelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidArgument(message) => write!(f, "invalid argument: {message}"),
            Self::Format(message) => write!(f, "format error: {message}"),
        }
    }
}

impl Error for ModelError {}
