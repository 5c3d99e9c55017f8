//! Collection registry for Archivist.
//!
//! This module provides:
//! - Collection metadata records stored in `u:<user>:<colls>`
//! - Creation, listing and cascading deletion of collections
//! - The on-disk and remote layout of accounts and collections

mod paths;
mod registry;

pub use paths::{PathRouter, ARCHIVE_DIR_NAME};
pub use registry::CollectionRegistry;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::store::Schema;

/// Metadata record of one collection.
///
/// `title` is always present; any other field set through
/// [`CollectionRegistry::set_metadata`] is kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionMeta {
    /// Display title.
    #[serde(default)]
    pub title: String,
    /// Additional caller-defined fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CollectionMeta {
    /// Create a record with a title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            extra: Map::new(),
        }
    }

    /// Read a field by name.
    pub fn get_field(&self, name: &str) -> Option<Value> {
        if name == "title" {
            Some(Value::String(self.title.clone()))
        } else {
            self.extra.get(name).cloned()
        }
    }

    /// Set a field by name. A non-string title is stored as its JSON text.
    pub fn set_field(&mut self, name: &str, value: Value) {
        if name == "title" {
            self.title = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
        } else {
            self.extra.insert(name.to_string(), value);
        }
    }
}

/// Schema of the per-account collection index.
pub struct CollectionIndex;

impl Schema for CollectionIndex {
    type Value = CollectionMeta;
}

/// Who can read a new collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    /// Readable by everyone.
    Public,
    /// Readable by the owner and explicit grants only.
    #[default]
    Private,
}

impl Visibility {
    /// Parse an access form value; anything but `public` is private.
    pub fn parse(access: &str) -> Self {
        if access == "public" {
            Visibility::Public
        } else {
            Visibility::Private
        }
    }
}

/// A readable collection as returned by [`CollectionRegistry::list_collections`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionSummary {
    /// Collection name.
    pub name: String,
    /// Stored metadata.
    #[serde(flatten)]
    pub meta: CollectionMeta,
    /// Public URL path.
    pub path: String,
    /// Bytes stored, if recorded.
    pub size: Option<u64>,
}
