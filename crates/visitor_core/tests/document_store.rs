use serde_json::json;
use std::cell::Cell;
use std::time::Duration;
use visitor_core::db::{open_db, open_db_in_memory, open_db_with_options, DbOptions};
use visitor_core::{
    DocumentData, DocumentRef, DocumentStore, MemoryDocumentStore, SqliteDocumentStore,
    StoreError,
};

fn fields(value: serde_json::Value) -> DocumentData {
    value.as_object().cloned().unwrap()
}

fn profile_ref() -> DocumentRef {
    DocumentRef::new("metrics", "profile")
}

fn assert_missing_then_created(store: &impl DocumentStore) {
    let reference = profile_ref();
    assert!(!store.get(&reference).unwrap().exists());

    store
        .run_transaction(|tx| tx.set_merge(&reference, fields(json!({ "count": 1 }))))
        .unwrap();

    let snapshot = store.get(&reference).unwrap();
    assert_eq!(snapshot.field("count"), Some(&json!(1)));
}

fn assert_merge_preserves_other_fields(store: &impl DocumentStore) {
    let reference = profile_ref();
    store
        .run_transaction(|tx| {
            tx.set_merge(
                &reference,
                fields(json!({ "count": 7, "since": "2024-01-01" })),
            )
        })
        .unwrap();
    store
        .run_transaction(|tx| tx.set_merge(&reference, fields(json!({ "count": 8 }))))
        .unwrap();

    let snapshot = store.get(&reference).unwrap();
    assert_eq!(snapshot.field("count"), Some(&json!(8)));
    assert_eq!(snapshot.field("since"), Some(&json!("2024-01-01")));
}

fn assert_failed_body_leaves_no_trace(store: &impl DocumentStore) {
    let reference = profile_ref();
    let result: Result<(), StoreError> = store.run_transaction(|tx| {
        tx.set_merge(&reference, fields(json!({ "count": 99 })))?;
        Err(StoreError::InvalidDocument("rejected by body".to_string()))
    });

    assert!(matches!(result, Err(StoreError::InvalidDocument(_))));
    assert!(!store.get(&reference).unwrap().exists());
}

fn assert_contention_exhausts_retries(store: &impl DocumentStore, max_attempts: u32) {
    let calls = Cell::new(0);
    let result: Result<(), StoreError> = store.run_transaction(|_tx| {
        calls.set(calls.get() + 1);
        Err(StoreError::Contention(profile_ref()))
    });

    match result {
        Err(StoreError::RetriesExhausted { attempts, last }) => {
            assert_eq!(attempts, max_attempts);
            assert!(matches!(*last, StoreError::Contention(_)));
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(calls.get(), max_attempts);
}

#[test]
fn sqlite_store_reads_missing_then_created_document() {
    let conn = open_db_in_memory().unwrap();
    assert_missing_then_created(&SqliteDocumentStore::new(&conn));
}

#[test]
fn memory_store_reads_missing_then_created_document() {
    assert_missing_then_created(&MemoryDocumentStore::new());
}

#[test]
fn sqlite_store_merge_preserves_other_fields() {
    let conn = open_db_in_memory().unwrap();
    assert_merge_preserves_other_fields(&SqliteDocumentStore::new(&conn));
}

#[test]
fn memory_store_merge_preserves_other_fields() {
    assert_merge_preserves_other_fields(&MemoryDocumentStore::new());
}

#[test]
fn sqlite_store_rolls_back_failed_body() {
    let conn = open_db_in_memory().unwrap();
    assert_failed_body_leaves_no_trace(&SqliteDocumentStore::new(&conn));
}

#[test]
fn memory_store_discards_failed_body() {
    assert_failed_body_leaves_no_trace(&MemoryDocumentStore::new());
}

#[test]
fn sqlite_store_gives_up_after_max_attempts() {
    let conn = open_db_in_memory().unwrap();
    assert_contention_exhausts_retries(&SqliteDocumentStore::with_max_attempts(&conn, 3), 3);
}

#[test]
fn memory_store_gives_up_after_max_attempts() {
    assert_contention_exhausts_retries(&MemoryDocumentStore::with_max_attempts(4), 4);
}

#[test]
fn memory_store_retries_when_a_read_document_changes_before_commit() {
    let store = MemoryDocumentStore::new();
    let reference = profile_ref();
    let runs = Cell::new(0);

    let committed = store
        .run_transaction(|tx| {
            runs.set(runs.get() + 1);
            let snapshot = tx.get(&reference)?;
            let seen = snapshot.field("count").and_then(|v| v.as_u64()).unwrap_or(0);
            if runs.get() == 1 {
                // A competing writer commits between our read and our commit.
                store.run_transaction(|other| {
                    other.set_merge(&reference, fields(json!({ "count": 10 })))
                })?;
            }
            tx.set_merge(&reference, fields(json!({ "count": seen + 1 })))?;
            Ok(seen + 1)
        })
        .unwrap();

    assert_eq!(runs.get(), 2);
    assert_eq!(committed, 11);
    assert_eq!(store.get(&reference).unwrap().field("count"), Some(&json!(11)));
    assert_eq!(store.version(&reference).unwrap(), 2);
}

#[test]
fn memory_store_offline_fails_reads_and_transactions() {
    let store = MemoryDocumentStore::new();
    store.set_online(false);

    assert!(matches!(
        store.get(&profile_ref()),
        Err(StoreError::Unavailable(_))
    ));
    let result = store.run_transaction(|tx| tx.get(&profile_ref()));
    assert!(matches!(result, Err(StoreError::Unavailable(_))));

    store.set_online(true);
    assert!(store.get(&profile_ref()).is_ok());
}

#[test]
fn sqlite_store_reports_busy_lock_as_exhausted_retries() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.sqlite3");

    let holder = open_db(&path).unwrap();
    holder.execute_batch("BEGIN IMMEDIATE;").unwrap();

    let waiter = open_db_with_options(
        &path,
        DbOptions {
            busy_timeout: Duration::from_millis(10),
        },
    )
    .unwrap();
    let store = SqliteDocumentStore::with_max_attempts(&waiter, 2);
    let result = store.run_transaction(|tx| tx.get(&profile_ref()));

    match result {
        Err(StoreError::RetriesExhausted { attempts, last }) => {
            assert_eq!(attempts, 2);
            assert!(last.is_retryable());
        }
        other => panic!("unexpected result: {other:?}"),
    }

    holder.execute_batch("ROLLBACK;").unwrap();
    assert!(store.run_transaction(|tx| tx.get(&profile_ref())).is_ok());
}

#[test]
fn sqlite_store_rejects_non_object_document() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO documents (collection, doc_id, data) VALUES ('metrics', 'profile', '[1,2]');",
        [],
    )
    .unwrap();

    let store = SqliteDocumentStore::new(&conn);
    assert!(matches!(
        store.get(&profile_ref()),
        Err(StoreError::InvalidDocument(_))
    ));
}
