//! Document store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Define the two primitives the counter depends on: a plain `get` and a
//!   retried, isolated `run_transaction`.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - A transaction body either commits as a whole or leaves no trace.
//! - Writes use merge semantics: fields not named in a write are preserved.
//! - Bodies may run more than once; only the committed run is observable.

use crate::db::DbError;
use crate::model::document::{merge_fields, DocumentData, DocumentRef, DocumentSnapshot};
use log::{debug, warn};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Commit attempts a store makes before giving up on a contended transaction.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

pub type StoreResult<T> = Result<T, StoreError>;

/// Error returned by document store reads and transactions.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    /// A concurrent writer got in first; the transaction may be retried.
    Contention(DocumentRef),
    /// The store cannot be reached at all.
    Unavailable(String),
    InvalidDocument(String),
    RetriesExhausted {
        attempts: u32,
        last: Box<StoreError>,
    },
}

impl StoreError {
    /// Returns whether running the transaction again may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Contention(_) => true,
            Self::Db(err) => err.is_busy(),
            _ => false,
        }
    }

    /// Stable short code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Db(_) => "db_error",
            Self::Contention(_) => "contention",
            Self::Unavailable(_) => "store_unavailable",
            Self::InvalidDocument(_) => "invalid_document",
            Self::RetriesExhausted { .. } => "retries_exhausted",
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Contention(reference) => {
                write!(f, "document {reference} changed during transaction")
            }
            Self::Unavailable(message) => write!(f, "document store unavailable: {message}"),
            Self::InvalidDocument(message) => write!(f, "invalid persisted document: {message}"),
            Self::RetriesExhausted { attempts, last } => {
                write!(f, "transaction gave up after {attempts} attempt(s): {last}")
            }
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::RetriesExhausted { last, .. } => Some(last.as_ref()),
            Self::Contention(_) | Self::Unavailable(_) | Self::InvalidDocument(_) => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Handle passed to a transaction body.
pub trait Transaction {
    /// Reads a document as of this transaction.
    fn get(&mut self, reference: &DocumentRef) -> StoreResult<DocumentSnapshot>;
    /// Writes `fields` into the document with merge semantics, creating it
    /// when absent. Takes effect on commit.
    fn set_merge(&mut self, reference: &DocumentRef, fields: DocumentData) -> StoreResult<()>;
}

/// Transactional document store consumed by the visitor counter.
pub trait DocumentStore {
    /// Non-transactional read; may observe a stale value.
    fn get(&self, reference: &DocumentRef) -> StoreResult<DocumentSnapshot>;

    /// Runs `body` inside an isolated transaction and commits it.
    ///
    /// # Errors
    /// - Returns `RetriesExhausted` when every attempt hit contention.
    /// - Returns the body's own error unchanged when it is not retryable.
    fn run_transaction<T, F>(&self, body: F) -> StoreResult<T>
    where
        F: FnMut(&mut dyn Transaction) -> StoreResult<T>;
}

impl<S: DocumentStore> DocumentStore for &S {
    fn get(&self, reference: &DocumentRef) -> StoreResult<DocumentSnapshot> {
        (**self).get(reference)
    }

    fn run_transaction<T, F>(&self, body: F) -> StoreResult<T>
    where
        F: FnMut(&mut dyn Transaction) -> StoreResult<T>,
    {
        (**self).run_transaction(body)
    }
}

/// Drives `attempt` until it succeeds, fails permanently, or runs out of
/// attempts. Shared by every store implementation.
pub(crate) fn retry_transaction<T>(
    store: &str,
    max_attempts: u32,
    mut attempt: impl FnMut() -> StoreResult<T>,
) -> StoreResult<T> {
    let started_at = Instant::now();
    let max_attempts = max_attempts.max(1);
    let mut attempts = 0;

    loop {
        attempts += 1;
        match attempt() {
            Ok(value) => {
                debug!(
                    "event=store_tx module=repo status=ok store={store} attempt={attempts} duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                return Ok(value);
            }
            Err(err) if err.is_retryable() && attempts < max_attempts => {
                debug!(
                    "event=store_tx module=repo status=retry store={store} attempt={attempts} error_code={}",
                    err.code()
                );
            }
            Err(err) if err.is_retryable() => {
                warn!(
                    "event=store_tx module=repo status=error store={store} attempt={attempts} duration_ms={} error_code=retries_exhausted",
                    started_at.elapsed().as_millis()
                );
                return Err(StoreError::RetriesExhausted {
                    attempts,
                    last: Box::new(err),
                });
            }
            Err(err) => {
                warn!(
                    "event=store_tx module=repo status=error store={store} attempt={attempts} duration_ms={} error_code={}",
                    started_at.elapsed().as_millis(),
                    err.code()
                );
                return Err(err);
            }
        }
    }
}

/// SQLite-backed document store.
///
/// Concurrent writers use separate connections to the same file; each
/// transaction takes the write lock up front (`BEGIN IMMEDIATE`) and waits up
/// to the connection's busy timeout before counting as contended.
pub struct SqliteDocumentStore<'conn> {
    conn: &'conn Connection,
    max_attempts: u32,
}

impl<'conn> SqliteDocumentStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self::with_max_attempts(conn, DEFAULT_MAX_ATTEMPTS)
    }

    pub fn with_max_attempts(conn: &'conn Connection, max_attempts: u32) -> Self {
        Self {
            conn,
            max_attempts: max_attempts.max(1),
        }
    }

    fn attempt<T, F>(&self, body: &mut F) -> StoreResult<T>
    where
        F: FnMut(&mut dyn Transaction) -> StoreResult<T>,
    {
        let tx = rusqlite::Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let value = {
            let mut handle = SqliteTransaction { conn: &tx };
            body(&mut handle)?
        };
        tx.commit()?;
        Ok(value)
    }
}

impl DocumentStore for SqliteDocumentStore<'_> {
    fn get(&self, reference: &DocumentRef) -> StoreResult<DocumentSnapshot> {
        read_document(self.conn, reference)
    }

    fn run_transaction<T, F>(&self, mut body: F) -> StoreResult<T>
    where
        F: FnMut(&mut dyn Transaction) -> StoreResult<T>,
    {
        retry_transaction("sqlite", self.max_attempts, || self.attempt(&mut body))
    }
}

struct SqliteTransaction<'tx> {
    conn: &'tx Connection,
}

impl Transaction for SqliteTransaction<'_> {
    fn get(&mut self, reference: &DocumentRef) -> StoreResult<DocumentSnapshot> {
        read_document(self.conn, reference)
    }

    fn set_merge(&mut self, reference: &DocumentRef, fields: DocumentData) -> StoreResult<()> {
        let mut data = read_document(self.conn, reference)?
            .data
            .unwrap_or_default();
        merge_fields(&mut data, &fields);
        let encoded = serde_json::to_string(&data).map_err(|err| {
            StoreError::InvalidDocument(format!("cannot encode {reference}: {err}"))
        })?;

        self.conn.execute(
            "INSERT INTO documents (collection, doc_id, data)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (collection, doc_id) DO UPDATE SET
                data = excluded.data,
                version = documents.version + 1,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![reference.collection, reference.id, encoded],
        )?;
        Ok(())
    }
}

fn read_document(conn: &Connection, reference: &DocumentRef) -> StoreResult<DocumentSnapshot> {
    let raw = conn
        .query_row(
            "SELECT data FROM documents WHERE collection = ?1 AND doc_id = ?2;",
            params![reference.collection, reference.id],
            |row| row.get::<_, String>(0),
        )
        .optional()?;

    let Some(raw) = raw else {
        return Ok(DocumentSnapshot::missing(reference.clone()));
    };

    let data = serde_json::from_str::<DocumentData>(&raw).map_err(|err| {
        StoreError::InvalidDocument(format!("documents.data for {reference} is not an object: {err}"))
    })?;
    Ok(DocumentSnapshot::found(reference.clone(), data))
}
