use visitor_core::db::open_db_in_memory;
use visitor_core::repo::local_storage::LocalStorage;
use visitor_core::service::tracker::LAST_KNOWN_COUNT_KEY;
use visitor_core::service::visit_marker::VISITED_MARKER_KEY;
use visitor_core::{
    CountSource, MemoryDocumentStore, MemoryLocalStorage, SqliteDocumentStore,
    SqliteLocalStorage, VisitorTracker,
};

#[test]
fn fresh_client_increments_counter_from_zero_to_one() {
    let store = MemoryDocumentStore::new();
    let tracker = VisitorTracker::new(MemoryLocalStorage::new(), &store);

    let load = tracker.on_page_load();
    assert!(load.first_visit);
    assert_eq!(load.count, Some(1));
    assert_eq!(load.source, CountSource::Incremented);
    assert_eq!(tracker.counter().get_visitor_count().unwrap(), 1);
}

#[test]
fn returning_client_reads_without_changing_count() {
    let store = MemoryDocumentStore::new();
    let storage = MemoryLocalStorage::new();
    let tracker = VisitorTracker::new(&storage, &store);

    tracker.on_page_load();
    let returning = tracker.on_page_load();

    assert!(!returning.first_visit);
    assert_eq!(returning.count, Some(1));
    assert_eq!(returning.source, CountSource::Read);
    assert_eq!(tracker.counter().get_visitor_count().unwrap(), 1);
}

#[test]
fn each_new_client_counts_once_against_shared_store() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteDocumentStore::new(&conn);
    let clients: Vec<MemoryLocalStorage> = (0..3).map(|_| MemoryLocalStorage::new()).collect();

    for client in &clients {
        VisitorTracker::new(client, &store).on_page_load();
        VisitorTracker::new(client, &store).on_page_load();
    }

    let last = VisitorTracker::new(&clients[0], &store).on_page_load();
    assert_eq!(last.count, Some(3));
    assert_eq!(last.display(), "3");
}

#[test]
fn disabled_storage_is_treated_as_returning_and_never_counted() {
    let store = MemoryDocumentStore::new();
    let tracker = VisitorTracker::new(MemoryLocalStorage::disabled(), &store);

    for _ in 0..3 {
        let load = tracker.on_page_load();
        assert!(!load.first_visit);
        assert_eq!(load.count, Some(0));
        assert_eq!(load.source, CountSource::Read);
    }
    assert_eq!(tracker.counter().get_visitor_count().unwrap(), 0);
}

#[test]
fn offline_store_without_history_shows_fallback() {
    let store = MemoryDocumentStore::new();
    store.set_online(false);
    let tracker = VisitorTracker::new(MemoryLocalStorage::new(), &store);

    let load = tracker.on_page_load();
    assert!(load.first_visit);
    assert_eq!(load.count, None);
    assert_eq!(load.source, CountSource::Unavailable);
    assert_eq!(load.display(), "—");
}

#[test]
fn offline_store_falls_back_to_last_known_count() {
    let store = MemoryDocumentStore::new();
    let storage = MemoryLocalStorage::new();
    let tracker = VisitorTracker::new(&storage, &store);

    assert_eq!(tracker.on_page_load().count, Some(1));
    assert_eq!(
        storage.get_item(LAST_KNOWN_COUNT_KEY).unwrap().as_deref(),
        Some("1")
    );

    store.set_online(false);
    let load = tracker.on_page_load();
    assert!(!load.first_visit);
    assert_eq!(load.count, Some(1));
    assert_eq!(load.source, CountSource::LastKnown);
}

#[test]
fn failed_first_visit_increment_does_not_retry_on_next_load() {
    let store = MemoryDocumentStore::new();
    let storage = MemoryLocalStorage::new();
    let tracker = VisitorTracker::new(&storage, &store);

    store.set_online(false);
    assert_eq!(tracker.on_page_load().source, CountSource::Unavailable);

    store.set_online(true);
    let load = tracker.on_page_load();
    assert!(!load.first_visit);
    assert_eq!(load.count, Some(0));
}

#[test]
fn sqlite_backed_client_and_store_complete_the_flow() {
    let local = open_db_in_memory().unwrap();
    let remote = open_db_in_memory().unwrap();
    let storage = SqliteLocalStorage::new(&local);
    let tracker = VisitorTracker::new(&storage, SqliteDocumentStore::new(&remote));

    assert_eq!(tracker.on_page_load().count, Some(1));
    assert_eq!(
        storage.get_item(VISITED_MARKER_KEY).unwrap().as_deref(),
        Some("true")
    );
    assert_eq!(tracker.on_page_load().source, CountSource::Read);
}
