//! Command bodies and the storage adapters behind them.
//!
//! # Invariants
//! - `visit` never fails: a local database that cannot be opened behaves as
//!   disabled storage, and a store database that cannot be opened behaves as
//!   an unreachable store.
//! - `count` and `increment` report any failure to the caller.

use log::warn;
use rusqlite::Connection;
use std::path::Path;
use visitor_core::db::{open_db_with_options, DbResult};
use visitor_core::{
    DocumentRef, DocumentSnapshot, DocumentStore, LocalStorage, LocalStorageError, PageLoad,
    SqliteDocumentStore, SqliteLocalStorage, StoreError, StoreResult, Transaction,
    VisitResult, VisitorConfig, VisitorCounterService, VisitorTracker,
};

use crate::Command;

/// Runs one command and returns its output line.
pub(crate) fn execute(command: Command, config: &VisitorConfig) -> Result<String, String> {
    match command {
        Command::Visit => {
            let load = visit(config);
            Ok(format!(
                "first_visit={} count={} source={}",
                load.first_visit,
                load.display(),
                load.source.as_str()
            ))
        }
        Command::Count => {
            let conn = open_store_db(config)?;
            let service = VisitorCounterService::new(sqlite_store(&conn, config));
            count_line(service.get_visitor_count())
        }
        Command::Increment => {
            let conn = open_store_db(config)?;
            let service = VisitorCounterService::new(sqlite_store(&conn, config));
            count_line(service.increment_unique_visitor())
        }
    }
}

fn visit(config: &VisitorConfig) -> PageLoad {
    let local_conn = open_or_degrade(&config.local_db_path, config, "local");
    let store_conn = open_or_degrade(&config.store_db_path, config, "store");

    let storage = match local_conn.as_ref() {
        Ok(conn) => ClientStorage::Sqlite(SqliteLocalStorage::new(conn)),
        Err(_) => ClientStorage::Unopened,
    };
    let store = match store_conn.as_ref() {
        Ok(conn) => CounterStore::Sqlite(sqlite_store(conn, config)),
        Err(err) => CounterStore::Unreachable(err.to_string()),
    };

    VisitorTracker::new(storage, store).on_page_load()
}

fn open_or_degrade(path: &Path, config: &VisitorConfig, role: &str) -> DbResult<Connection> {
    open_db_with_options(path, config.db_options()).map_err(|err| {
        warn!(
            "event=cli_open module=cli status=degraded role={role} path={} error={}",
            path.display(),
            err
        );
        err
    })
}

fn open_store_db(config: &VisitorConfig) -> Result<Connection, String> {
    open_db_with_options(&config.store_db_path, config.db_options())
        .map_err(|err| format!("cannot open {}: {err}", config.store_db_path.display()))
}

fn sqlite_store<'conn>(
    conn: &'conn Connection,
    config: &VisitorConfig,
) -> SqliteDocumentStore<'conn> {
    SqliteDocumentStore::with_max_attempts(conn, config.max_attempts)
}

fn count_line(result: VisitResult<u64>) -> Result<String, String> {
    result.map(|count| format!("count={count}")).map_err(|err| {
        warn!(
            "event=cli_command module=cli status=error error_code={}",
            err.code()
        );
        err.to_string()
    })
}

/// Client-local storage for `visit`; `Unopened` rejects every call.
enum ClientStorage<'conn> {
    Sqlite(SqliteLocalStorage<'conn>),
    Unopened,
}

impl LocalStorage for ClientStorage<'_> {
    fn get_item(&self, key: &str) -> Result<Option<String>, LocalStorageError> {
        match self {
            Self::Sqlite(storage) => storage.get_item(key),
            Self::Unopened => Err(LocalStorageError::Disabled),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), LocalStorageError> {
        match self {
            Self::Sqlite(storage) => storage.set_item(key, value),
            Self::Unopened => Err(LocalStorageError::Disabled),
        }
    }
}

/// Counter store for `visit`; `Unreachable` fails every call with the open
/// error it was built from.
enum CounterStore<'conn> {
    Sqlite(SqliteDocumentStore<'conn>),
    Unreachable(String),
}

impl DocumentStore for CounterStore<'_> {
    fn get(&self, reference: &DocumentRef) -> StoreResult<DocumentSnapshot> {
        match self {
            Self::Sqlite(store) => store.get(reference),
            Self::Unreachable(message) => Err(StoreError::Unavailable(message.clone())),
        }
    }

    fn run_transaction<T, F>(&self, body: F) -> StoreResult<T>
    where
        F: FnMut(&mut dyn Transaction) -> StoreResult<T>,
    {
        match self {
            Self::Sqlite(store) => store.run_transaction(body),
            Self::Unreachable(message) => Err(StoreError::Unavailable(message.clone())),
        }
    }
}
