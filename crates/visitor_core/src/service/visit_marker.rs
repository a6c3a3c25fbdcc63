//! First-visit detection over client-local storage.
//!
//! # Invariants
//! - The marker is written at most once per storage scope.
//! - A stored empty string counts as absent.

use crate::repo::local_storage::LocalStorage;
use crate::service::error::{VisitError, VisitResult};
use log::debug;

pub const VISITED_MARKER_KEY: &str = "hasVisited";
const VISITED_MARKER_VALUE: &str = "true";

/// Decides whether the current client has been seen before.
pub struct VisitMarker<S: LocalStorage> {
    storage: S,
}

impl<S: LocalStorage> VisitMarker<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Returns `true` exactly once per storage scope: on the call that finds
    /// the marker absent and sets it.
    ///
    /// # Errors
    /// - Returns `StorageUnavailable` when the storage cannot be read or the
    ///   marker cannot be written. Callers should treat this as a returning
    ///   visitor.
    pub fn check_and_mark_visited(&self) -> VisitResult<bool> {
        let existing = self
            .storage
            .get_item(VISITED_MARKER_KEY)
            .map_err(VisitError::StorageUnavailable)?;

        if existing.is_some_and(|value| !value.is_empty()) {
            return Ok(false);
        }

        self.storage
            .set_item(VISITED_MARKER_KEY, VISITED_MARKER_VALUE)
            .map_err(VisitError::StorageUnavailable)?;
        debug!("event=visit_marker module=service status=ok first_visit=true");
        Ok(true)
    }

    pub(crate) fn storage(&self) -> &S {
        &self.storage
    }
}
