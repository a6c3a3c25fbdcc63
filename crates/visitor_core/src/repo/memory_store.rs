//! In-process document store with optimistic transactions.
//!
//! # Responsibility
//! - Stand in for the remote document store in tests and offline runs.
//! - Reproduce the remote store's concurrency model: transactions never hold
//!   a lock while the body runs; commit validates what was read.
//!
//! # Invariants
//! - Every committed write bumps the document version by one.
//! - A commit is rejected with `Contention` when any document it read has
//!   changed since the read. Absent documents have version 0.

use crate::model::document::{merge_fields, DocumentData, DocumentRef, DocumentSnapshot};
use crate::repo::document_store::{
    retry_transaction, DocumentStore, StoreError, StoreResult, Transaction, DEFAULT_MAX_ATTEMPTS,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone)]
struct StoredDocument {
    version: u64,
    data: DocumentData,
}

type Documents = BTreeMap<DocumentRef, StoredDocument>;

/// Thread-safe in-memory document store.
#[derive(Debug)]
pub struct MemoryDocumentStore {
    documents: Mutex<Documents>,
    online: AtomicBool,
    max_attempts: u32,
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::with_max_attempts(DEFAULT_MAX_ATTEMPTS)
    }

    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            documents: Mutex::new(BTreeMap::new()),
            online: AtomicBool::new(true),
            max_attempts: max_attempts.max(1),
        }
    }

    /// Simulates losing (or regaining) connectivity. While offline every read
    /// and transaction fails with `StoreError::Unavailable`.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Returns the committed version of a document, 0 when absent.
    pub fn version(&self, reference: &DocumentRef) -> StoreResult<u64> {
        let documents = self.lock()?;
        Ok(version_of(&documents, reference))
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Documents>> {
        if !self.is_online() {
            return Err(StoreError::Unavailable("memory store is offline".to_string()));
        }
        self.documents
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }

    fn attempt<T, F>(&self, body: &mut F) -> StoreResult<T>
    where
        F: FnMut(&mut dyn Transaction) -> StoreResult<T>,
    {
        let mut tx = MemoryTransaction {
            store: self,
            read_versions: BTreeMap::new(),
            writes: BTreeMap::new(),
        };
        let value = body(&mut tx)?;
        self.commit(tx.read_versions, tx.writes)?;
        Ok(value)
    }

    fn commit(
        &self,
        read_versions: BTreeMap<DocumentRef, u64>,
        writes: BTreeMap<DocumentRef, DocumentData>,
    ) -> StoreResult<()> {
        let mut documents = self.lock()?;

        for (reference, seen) in &read_versions {
            if version_of(&documents, reference) != *seen {
                return Err(StoreError::Contention(reference.clone()));
            }
        }

        for (reference, fields) in writes {
            let stored = documents.entry(reference).or_insert_with(|| StoredDocument {
                version: 0,
                data: DocumentData::new(),
            });
            merge_fields(&mut stored.data, &fields);
            stored.version += 1;
        }

        Ok(())
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn get(&self, reference: &DocumentRef) -> StoreResult<DocumentSnapshot> {
        let documents = self.lock()?;
        Ok(snapshot_of(&documents, reference))
    }

    fn run_transaction<T, F>(&self, mut body: F) -> StoreResult<T>
    where
        F: FnMut(&mut dyn Transaction) -> StoreResult<T>,
    {
        retry_transaction("memory", self.max_attempts, || self.attempt(&mut body))
    }
}

struct MemoryTransaction<'store> {
    store: &'store MemoryDocumentStore,
    read_versions: BTreeMap<DocumentRef, u64>,
    writes: BTreeMap<DocumentRef, DocumentData>,
}

impl Transaction for MemoryTransaction<'_> {
    fn get(&mut self, reference: &DocumentRef) -> StoreResult<DocumentSnapshot> {
        let (version, mut snapshot) = {
            let documents = self.store.lock()?;
            (
                version_of(&documents, reference),
                snapshot_of(&documents, reference),
            )
        };

        match self.read_versions.get(reference) {
            Some(seen) if *seen != version => {
                return Err(StoreError::Contention(reference.clone()));
            }
            Some(_) => {}
            None => {
                self.read_versions.insert(reference.clone(), version);
            }
        }

        if let Some(pending) = self.writes.get(reference) {
            let mut data = snapshot.data.take().unwrap_or_default();
            merge_fields(&mut data, pending);
            snapshot.data = Some(data);
        }
        Ok(snapshot)
    }

    fn set_merge(&mut self, reference: &DocumentRef, fields: DocumentData) -> StoreResult<()> {
        let pending = self.writes.entry(reference.clone()).or_default();
        merge_fields(pending, &fields);
        Ok(())
    }
}

fn version_of(documents: &Documents, reference: &DocumentRef) -> u64 {
    documents.get(reference).map_or(0, |stored| stored.version)
}

fn snapshot_of(documents: &Documents, reference: &DocumentRef) -> DocumentSnapshot {
    match documents.get(reference) {
        Some(stored) => DocumentSnapshot::found(reference.clone(), stored.data.clone()),
        None => DocumentSnapshot::missing(reference.clone()),
    }
}
