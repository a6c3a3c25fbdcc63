//! Unique-visitor counter operations.
//!
//! # Responsibility
//! - Advance the singleton counter by exactly one inside a store transaction.
//! - Read the counter for display.
//!
//! # Invariants
//! - Increments go through `DocumentStore::run_transaction` only; isolation
//!   and retries belong to the store.
//! - The write uses merge semantics so unrelated fields survive.

use crate::model::counter::{unique_visitors_ref, VisitorCounter};
use crate::repo::document_store::{DocumentStore, StoreError};
use crate::service::error::{VisitError, VisitResult};
use log::{info, warn};
use std::time::Instant;

/// Counter use-case service over an injected document store.
pub struct VisitorCounterService<D: DocumentStore> {
    store: D,
}

impl<D: DocumentStore> VisitorCounterService<D> {
    pub fn new(store: D) -> Self {
        Self { store }
    }

    /// Records one more unique visitor and returns the committed count.
    ///
    /// # Errors
    /// - Returns `TransactionAborted` when the store cannot commit, including
    ///   after its retry policy is exhausted or when the stored count is not
    ///   a valid counter.
    pub fn increment_unique_visitor(&self) -> VisitResult<u64> {
        let started_at = Instant::now();
        let reference = unique_visitors_ref();

        let result = self.store.run_transaction(|tx| {
            let snapshot = tx.get(&reference)?;
            let current =
                VisitorCounter::from_snapshot(&snapshot).map_err(StoreError::InvalidDocument)?;
            let next = current.incremented().ok_or_else(|| {
                StoreError::InvalidDocument(format!("count overflow in {reference}"))
            })?;
            tx.set_merge(&reference, next.to_fields())?;
            Ok(next.count)
        });

        match result {
            Ok(count) => {
                info!(
                    "event=visitor_increment module=service status=ok count={count} duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Ok(count)
            }
            Err(err) => {
                warn!(
                    "event=visitor_increment module=service status=error duration_ms={} error_code={} error={}",
                    started_at.elapsed().as_millis(),
                    err.code(),
                    err
                );
                Err(VisitError::TransactionAborted(err))
            }
        }
    }

    /// Returns the current count, 0 when the counter does not exist yet.
    ///
    /// The value may be stale relative to in-flight increments.
    ///
    /// # Errors
    /// - Returns `ReadUnavailable` when the store cannot be read or holds an
    ///   invalid counter.
    pub fn get_visitor_count(&self) -> VisitResult<u64> {
        let reference = unique_visitors_ref();
        let counter = self
            .store
            .get(&reference)
            .and_then(|snapshot| {
                VisitorCounter::from_snapshot(&snapshot).map_err(StoreError::InvalidDocument)
            })
            .map_err(|err| {
                warn!(
                    "event=visitor_read module=service status=error error_code={} error={}",
                    err.code(),
                    err
                );
                VisitError::ReadUnavailable(err)
            })?;
        Ok(counter.count)
    }
}
