//! Logical content objects and summaries.
//!
//! A `Content` is what callers read and edit. Its `data` is the JSON body of
//! the item; `metadata` is present only for types flagged as carrying
//! container metadata.

use super::item_id::ItemId;
use super::version::ItemVersion;
use super::TypeName;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Container metadata mirrored onto metadata-carrying content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentMetadata {
    pub row_id: Option<i64>,
    pub identity: Uuid,
    pub path: String,
    pub extension: Map<String, Value>,
}

/// Fully spliced content item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub content_type: TypeName,
    pub version: ItemVersion,
    pub data: Value,
    pub metadata: Option<ContentMetadata>,
}

impl Content {
    pub fn new(content_type: TypeName, version: ItemVersion, data: Value) -> Self {
        Self {
            content_type,
            version,
            data,
            metadata: None,
        }
    }

    /// Reads a top-level string field, mostly for display and tests.
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.data.get(name).and_then(Value::as_str)
    }

    pub fn has_metadata(&self) -> bool {
        self.metadata
            .as_ref()
            .is_some_and(|meta| meta.row_id.is_some() || !meta.extension.is_empty())
    }
}

/// Read-only projection of a content item used for references and listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub item_id: ItemId,
    pub path: String,
    pub version: ItemVersion,
    pub title: String,
}

impl Summary {
    pub fn content_type(&self) -> &TypeName {
        self.item_id.content_type()
    }
}
