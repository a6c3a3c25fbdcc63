//! Page-load flow: marker check, then increment or read, with every failure
//! degraded to something the page can still render.
//!
//! # Invariants
//! - `on_page_load` never returns an error and never panics.
//! - A client whose storage is unavailable is never counted.

use crate::repo::document_store::DocumentStore;
use crate::repo::local_storage::LocalStorage;
use crate::service::visit_marker::VisitMarker;
use crate::service::visitor_counter::VisitorCounterService;
use log::{info, warn};

pub const LAST_KNOWN_COUNT_KEY: &str = "visitorCount:lastKnown";
/// Shown when no count can be obtained at all.
pub const FALLBACK_COUNT_DISPLAY: &str = "—";

/// Where the displayed count came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountSource {
    /// Committed by this page load's increment.
    Incremented,
    /// Read from the counter store.
    Read,
    /// Remote call failed; value cached by an earlier page load.
    LastKnown,
    /// Remote call failed and nothing was cached.
    Unavailable,
}

impl CountSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Incremented => "incremented",
            Self::Read => "read",
            Self::LastKnown => "last_known",
            Self::Unavailable => "unavailable",
        }
    }
}

/// Outcome of one page load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLoad {
    pub first_visit: bool,
    pub count: Option<u64>,
    pub source: CountSource,
}

impl PageLoad {
    /// Text for the visitor badge.
    pub fn display(&self) -> String {
        self.count
            .map_or_else(|| FALLBACK_COUNT_DISPLAY.to_string(), |count| count.to_string())
    }
}

/// Wires the visit marker and counter service together.
pub struct VisitorTracker<S: LocalStorage, D: DocumentStore> {
    marker: VisitMarker<S>,
    counter: VisitorCounterService<D>,
}

impl<S: LocalStorage, D: DocumentStore> VisitorTracker<S, D> {
    pub fn new(storage: S, store: D) -> Self {
        Self {
            marker: VisitMarker::new(storage),
            counter: VisitorCounterService::new(store),
        }
    }

    pub fn counter(&self) -> &VisitorCounterService<D> {
        &self.counter
    }

    /// Runs the page-load flow.
    pub fn on_page_load(&self) -> PageLoad {
        let first_visit = match self.marker.check_and_mark_visited() {
            Ok(first_visit) => first_visit,
            Err(err) => {
                warn!(
                    "event=page_load module=service status=degraded error_code={} error={}",
                    err.code(),
                    err
                );
                false
            }
        };

        let (remote, fresh_source) = if first_visit {
            (
                self.counter.increment_unique_visitor(),
                CountSource::Incremented,
            )
        } else {
            (self.counter.get_visitor_count(), CountSource::Read)
        };

        let outcome = match remote {
            Ok(count) => {
                self.remember_count(count);
                PageLoad {
                    first_visit,
                    count: Some(count),
                    source: fresh_source,
                }
            }
            Err(err) => {
                warn!(
                    "event=page_load module=service status=degraded error_code={}",
                    err.code()
                );
                match self.last_known_count() {
                    Some(count) => PageLoad {
                        first_visit,
                        count: Some(count),
                        source: CountSource::LastKnown,
                    },
                    None => PageLoad {
                        first_visit,
                        count: None,
                        source: CountSource::Unavailable,
                    },
                }
            }
        };

        info!(
            "event=page_load module=service status=ok first_visit={} source={}",
            outcome.first_visit,
            outcome.source.as_str()
        );
        outcome
    }

    fn remember_count(&self, count: u64) {
        if let Err(err) = self
            .marker
            .storage()
            .set_item(LAST_KNOWN_COUNT_KEY, &count.to_string())
        {
            warn!(
                "event=last_known_count module=service status=error error_code=write_failed error={}",
                err
            );
        }
    }

    fn last_known_count(&self) -> Option<u64> {
        match self.marker.storage().get_item(LAST_KNOWN_COUNT_KEY) {
            Ok(Some(value)) => value.parse().ok(),
            Ok(None) => None,
            Err(err) => {
                warn!(
                    "event=last_known_count module=service status=error error_code=read_failed error={}",
                    err
                );
                None
            }
        }
    }
}
