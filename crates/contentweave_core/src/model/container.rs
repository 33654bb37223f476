//! Persisted content container record.
//!
//! # Responsibility
//! - Hold one stored version of an item: path, type, version and JSON body.
//! - Wrap/unwrap the logical `Content` object.
//!
//! # Invariants
//! - `identity` is shared by every version of the same item.
//! - `row_id` is `None` until the storage layer persists the record.

use super::content::{Content, ContentMetadata, Summary};
use super::item_id::ItemId;
use super::version::ItemVersion;
use super::{ModelError, TypeName};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

/// Stored record wrapping one content version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Container {
    /// Storage key of this version, assigned on first persist.
    pub row_id: Option<i64>,
    /// Item identity, stable across versions and moves.
    pub identity: Uuid,
    pub data_type: TypeName,
    pub path: String,
    pub version: ItemVersion,
    /// Display projection derived from content on wrap.
    pub title: Option<String>,
    pub content: Value,
    /// Extension metadata merged into the record by the type extender.
    pub extension: Map<String, Value>,
}

impl Container {
    /// Creates an unsaved container with a fresh identity.
    pub fn new(data_type: TypeName) -> Self {
        Self {
            row_id: None,
            identity: Uuid::new_v4(),
            data_type,
            path: "/".to_string(),
            version: ItemVersion::new(),
            title: None,
            content: Value::Object(Map::new()),
            extension: Map::new(),
        }
    }

    pub fn is_new(&self) -> bool {
        self.row_id.is_none()
    }

    /// Unwraps the logical content object.
    pub fn content(&self, carries_metadata: bool) -> Content {
        let mut content = Content::new(
            self.data_type.clone(),
            self.version.clone(),
            self.content.clone(),
        );
        if carries_metadata {
            content.metadata = Some(self.metadata());
        }
        content
    }

    /// Wraps a logical content object into this container.
    pub fn set_content(&mut self, content: &Content, title: Option<String>) {
        self.content = content.data.clone();
        self.title = title;
    }

    pub fn metadata(&self) -> ContentMetadata {
        ContentMetadata {
            row_id: self.row_id,
            identity: self.identity,
            path: self.path.clone(),
            extension: self.extension.clone(),
        }
    }

    /// Adopts identity and extension metadata carried by content.
    pub fn copy_metadata_from(&mut self, metadata: &ContentMetadata) {
        self.row_id = metadata.row_id;
        self.identity = metadata.identity;
        self.path.clone_from(&metadata.path);
        self.extension.clone_from(&metadata.extension);
    }

    pub fn item_id(&self) -> Result<ItemId, ModelError> {
        ItemId::new(self.data_type.clone(), self.identity)
    }

    pub fn summary(&self) -> Result<Summary, ModelError> {
        Ok(Summary {
            item_id: self.item_id()?,
            path: self.path.clone(),
            version: self.version.clone(),
            title: self.title.clone().unwrap_or_default(),
        })
    }

    /// JSON view of the whole record, used as the source side of writebacks.
    pub fn record_view(&self) -> Value {
        json!({
            "row_id": self.row_id,
            "identity": self.identity.to_string(),
            "data_type": self.data_type.as_str(),
            "path": self.path,
            "version": self.version,
            "title": self.title,
            "content": self.content,
            "extension": self.extension,
        })
    }
}
