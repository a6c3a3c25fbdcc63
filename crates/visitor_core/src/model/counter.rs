//! Unique-visitor counter record.
//!
//! # Invariants
//! - Identity is fixed: `metrics/uniqueVisitors`.
//! - An absent document, a missing `count` or a `null` `count` all read as 0.
//! - A `count` that is not a non-negative integer is invalid persisted state.

use crate::model::document::{DocumentData, DocumentRef, DocumentSnapshot};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const METRICS_COLLECTION: &str = "metrics";
pub const UNIQUE_VISITORS_DOC: &str = "uniqueVisitors";

/// Address of the singleton counter document.
pub fn unique_visitors_ref() -> DocumentRef {
    DocumentRef::new(METRICS_COLLECTION, UNIQUE_VISITORS_DOC)
}

/// Counter value as stored in the `count` field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitorCounter {
    pub count: u64,
}

#[derive(Deserialize)]
struct StoredCounter {
    #[serde(default)]
    count: Option<u64>,
}

impl VisitorCounter {
    /// Reads the counter out of a snapshot.
    ///
    /// # Errors
    /// - Returns a description of the bad value when `count` is present but
    ///   not a non-negative integer.
    pub fn from_snapshot(snapshot: &DocumentSnapshot) -> Result<Self, String> {
        let Some(data) = snapshot.data.as_ref() else {
            return Ok(Self::default());
        };

        let stored: StoredCounter = serde_json::from_value(Value::Object(data.clone()))
            .map_err(|err| format!("invalid count in {}: {err}", snapshot.reference))?;
        Ok(Self {
            count: stored.count.unwrap_or(0),
        })
    }

    /// Returns the counter advanced by one visitor.
    pub fn incremented(self) -> Option<Self> {
        self.count.checked_add(1).map(|count| Self { count })
    }

    /// Returns the fields written back with merge semantics.
    pub fn to_fields(self) -> DocumentData {
        let mut fields = DocumentData::new();
        fields.insert("count".to_string(), Value::from(self.count));
        fields
    }
}
