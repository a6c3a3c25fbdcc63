//! Client-local key/value storage contracts and implementations.
//!
//! # Responsibility
//! - Model the browser-profile storage the visit marker lives in.
//! - Provide a durable SQLite implementation and an in-memory fake.
//!
//! # Invariants
//! - Values written with `set_item` survive until overwritten; nothing in
//!   this crate deletes keys.

use crate::db::DbError;
use log::warn;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Mutex;

pub type LocalStorageResult<T> = Result<T, LocalStorageError>;

#[derive(Debug)]
pub enum LocalStorageError {
    /// Storage is disabled or unsupported for this client.
    Disabled,
    Db(DbError),
}

impl Display for LocalStorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disabled => write!(f, "local storage is disabled"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for LocalStorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Disabled => None,
            Self::Db(err) => Some(err),
        }
    }
}

impl From<DbError> for LocalStorageError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for LocalStorageError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Synchronous string storage scoped to one client.
pub trait LocalStorage {
    fn get_item(&self, key: &str) -> LocalStorageResult<Option<String>>;
    fn set_item(&self, key: &str, value: &str) -> LocalStorageResult<()>;
}

impl<S: LocalStorage> LocalStorage for &S {
    fn get_item(&self, key: &str) -> LocalStorageResult<Option<String>> {
        (**self).get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> LocalStorageResult<()> {
        (**self).set_item(key, value)
    }
}

/// SQLite-backed local storage over the `local_items` table.
pub struct SqliteLocalStorage<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteLocalStorage<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl LocalStorage for SqliteLocalStorage<'_> {
    fn get_item(&self, key: &str) -> LocalStorageResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM local_items WHERE key = ?1;",
                [key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_item(&self, key: &str, value: &str) -> LocalStorageResult<()> {
        self.conn.execute(
            "INSERT INTO local_items (key, value) VALUES (?1, ?2)
             ON CONFLICT (key) DO UPDATE SET value = excluded.value;",
            params![key, value],
        )?;
        Ok(())
    }
}

/// In-memory local storage; `disabled()` builds one that rejects every call.
#[derive(Debug, Default)]
pub struct MemoryLocalStorage {
    items: Mutex<HashMap<String, String>>,
    disabled: bool,
}

impl MemoryLocalStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn disabled() -> Self {
        Self {
            items: Mutex::default(),
            disabled: true,
        }
    }

    fn with_items<T>(
        &self,
        op: impl FnOnce(&mut HashMap<String, String>) -> T,
    ) -> LocalStorageResult<T> {
        if self.disabled {
            return Err(LocalStorageError::Disabled);
        }
        let mut items = self.items.lock().map_err(|_| {
            warn!("event=local_storage module=repo status=error error_code=lock_poisoned");
            LocalStorageError::Disabled
        })?;
        Ok(op(&mut items))
    }
}

impl LocalStorage for MemoryLocalStorage {
    fn get_item(&self, key: &str) -> LocalStorageResult<Option<String>> {
        self.with_items(|items| items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> LocalStorageResult<()> {
        self.with_items(|items| {
            items.insert(key.to_string(), value.to_string());
        })
    }
}
