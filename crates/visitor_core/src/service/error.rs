//! Failure taxonomy surfaced to the page.
//!
//! Every variant is recoverable at the call site: a returning visitor, a
//! skipped count update, or a fallback display.

use crate::repo::document_store::StoreError;
use crate::repo::local_storage::LocalStorageError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type VisitResult<T> = Result<T, VisitError>;

#[derive(Debug)]
pub enum VisitError {
    /// Client-local storage could not be read or written.
    StorageUnavailable(LocalStorageError),
    /// The counter increment did not commit.
    TransactionAborted(StoreError),
    /// The counter could not be read.
    ReadUnavailable(StoreError),
}

impl VisitError {
    /// Stable short code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::StorageUnavailable(_) => "storage_unavailable",
            Self::TransactionAborted(_) => "transaction_aborted",
            Self::ReadUnavailable(_) => "read_unavailable",
        }
    }
}

impl Display for VisitError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StorageUnavailable(err) => write!(f, "local storage unavailable: {err}"),
            Self::TransactionAborted(err) => write!(f, "visitor increment aborted: {err}"),
            Self::ReadUnavailable(err) => write!(f, "visitor count unavailable: {err}"),
        }
    }
}

impl Error for VisitError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::StorageUnavailable(err) => Some(err),
            Self::TransactionAborted(err) | Self::ReadUnavailable(err) => Some(err),
        }
    }
}
