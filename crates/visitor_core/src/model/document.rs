//! Document addressing and snapshots.
//!
//! Documents are JSON objects grouped into named collections, the shape the
//! remote store exposes to the page.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{Display, Formatter};

/// Field map of one document.
pub type DocumentData = Map<String, Value>;

/// Address of one document: `collection/id`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentRef {
    pub collection: String,
    pub id: String,
}

impl DocumentRef {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

impl Display for DocumentRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// Point-in-time read of one document.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    pub reference: DocumentRef,
    /// `None` when the document does not exist.
    pub data: Option<DocumentData>,
}

impl DocumentSnapshot {
    pub fn missing(reference: DocumentRef) -> Self {
        Self {
            reference,
            data: None,
        }
    }

    pub fn found(reference: DocumentRef, data: DocumentData) -> Self {
        Self {
            reference,
            data: Some(data),
        }
    }

    pub fn exists(&self) -> bool {
        self.data.is_some()
    }

    /// Returns one field, or `None` when the document or the field is absent.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.as_ref().and_then(|data| data.get(name))
    }
}

/// Overlays `fields` onto `target`, leaving every other field untouched.
pub fn merge_fields(target: &mut DocumentData, fields: &DocumentData) {
    for (key, value) in fields {
        target.insert(key.clone(), value.clone());
    }
}
