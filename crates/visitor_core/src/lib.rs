//! Unique-visitor counting for the portfolio page.
//!
//! First-visit detection over client-local storage, an atomic increment of a
//! shared counter document, and a read-back for display. Both storages are
//! injected through traits so the page, the CLI and the tests can each pick
//! their own implementations.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, VisitorConfig};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::counter::{unique_visitors_ref, VisitorCounter};
pub use model::document::{DocumentData, DocumentRef, DocumentSnapshot};
pub use repo::document_store::{
    DocumentStore, SqliteDocumentStore, StoreError, StoreResult, Transaction,
    DEFAULT_MAX_ATTEMPTS,
};
pub use repo::local_storage::{
    LocalStorage, LocalStorageError, MemoryLocalStorage, SqliteLocalStorage,
};
pub use repo::memory_store::MemoryDocumentStore;
pub use service::error::{VisitError, VisitResult};
pub use service::tracker::{CountSource, PageLoad, VisitorTracker};
pub use service::visit_marker::VisitMarker;
pub use service::visitor_counter::VisitorCounterService;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
