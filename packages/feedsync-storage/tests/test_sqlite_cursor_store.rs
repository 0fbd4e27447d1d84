//! SqliteCursorStore against a file on disk

#![cfg(feature = "sqlite")]

use async_trait::async_trait;
use feedsync_core::domain::{ChangeRecord, Cursor, ResolvedSubtree};
use feedsync_core::infrastructure::InMemoryIndex;
use feedsync_core::ports::{
    ChangeFeedSource, ContentResolver, CursorStore, FeedBatch, FeedRequest, PortResult,
};
use feedsync_core::{PassConfig, Reconciler};
use feedsync_storage::{ErrorKind, SqliteCursorStore};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tempfile::TempDir;

const PARTITION: &str = "search-index";
const ROW: &str = "continuation-token";

#[tokio::test]
async fn test_cursor_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state").join("cursor.db");

    {
        let store = SqliteCursorStore::open(&path, PARTITION, ROW).unwrap();
        assert_eq!(store.get().await.unwrap(), None);
        store.put(&Cursor::new("c1")).await.unwrap();
    }

    let reopened = SqliteCursorStore::open(&path, PARTITION, ROW).unwrap();
    assert_eq!(reopened.get().await.unwrap(), Some(Cursor::new("c1")));
    assert_eq!(reopened.read_row().unwrap().unwrap().version, 1);
}

#[tokio::test]
async fn test_rows_are_isolated_by_key() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cursor.db");
    let staging = SqliteCursorStore::open(&path, PARTITION, "staging").unwrap();
    let production = SqliteCursorStore::open(&path, PARTITION, "production").unwrap();

    staging.put(&Cursor::new("s1")).await.unwrap();

    assert_eq!(production.get().await.unwrap(), None);
    assert_eq!(staging.get().await.unwrap(), Some(Cursor::new("s1")));
}

#[tokio::test]
async fn test_second_writer_loses_compare_and_put() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cursor.db");
    let a = SqliteCursorStore::open(&path, PARTITION, ROW).unwrap();
    let b = SqliteCursorStore::open(&path, PARTITION, ROW).unwrap();
    a.put(&Cursor::new("c1")).await.unwrap();

    let expected = Cursor::new("c1");
    assert!(a
        .compare_and_put(Some(&expected), &Cursor::new("c2"))
        .await
        .unwrap());
    assert!(!b
        .compare_and_put(Some(&expected), &Cursor::new("c2-other"))
        .await
        .unwrap());

    assert_eq!(b.get().await.unwrap(), Some(Cursor::new("c2")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_first_writers_from_spawned_tasks() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cursor.db");
    let store = SqliteCursorStore::open(&path, PARTITION, ROW).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .compare_and_put(None, &Cursor::new(format!("c0-{}", i)))
                    .await
                    .unwrap()
            })
        })
        .collect();
    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap() {
            winners += 1;
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(store.read_row().unwrap().unwrap().version, 1);
}

// ═══════════════════════════════════════════════════════════════════════════
// Full pass
// ═══════════════════════════════════════════════════════════════════════════

/// Feed that bootstraps at `c0` and then reports one deletion per call.
struct CountingFeed;

#[async_trait]
impl ChangeFeedSource for CountingFeed {
    async fn fetch(&self, request: &FeedRequest) -> PortResult<FeedBatch> {
        Ok(match request {
            FeedRequest::Bootstrap => FeedBatch {
                records: vec![],
                next_cursor: Cursor::new("c0"),
            },
            FeedRequest::Continue(cursor) => {
                let n: u32 = cursor.as_str().trim_start_matches('c').parse().unwrap_or(0);
                FeedBatch {
                    records: vec![ChangeRecord::deleted(format!("item_{}", n), "en")],
                    next_cursor: Cursor::new(format!("c{}", n + 1)),
                }
            }
        })
    }
}

struct EmptyResolver;

#[async_trait]
impl ContentResolver for EmptyResolver {
    async fn resolve(&self, _codename: &str, _language: &str) -> PortResult<Option<ResolvedSubtree>> {
        Ok(None)
    }
}

fn reconciler(store: SqliteCursorStore) -> Reconciler {
    Reconciler::new(
        Arc::new(store),
        Arc::new(CountingFeed),
        Arc::new(EmptyResolver),
        Arc::new(InMemoryIndex::new()),
        PassConfig::default(),
    )
    .unwrap()
}

#[tokio::test]
async fn test_passes_advance_the_stored_row() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cursor.db");

    let first = reconciler(SqliteCursorStore::open(&path, PARTITION, ROW).unwrap())
        .run_pass()
        .await
        .unwrap();
    assert!(first.bootstrapped);

    // a fresh process picks up where the last one stopped
    let second = reconciler(SqliteCursorStore::open(&path, PARTITION, ROW).unwrap())
        .run_pass()
        .await
        .unwrap();
    assert!(!second.bootstrapped);
    assert_eq!(second.cursor, Cursor::new("c1"));

    let row = SqliteCursorStore::open(&path, PARTITION, ROW)
        .unwrap()
        .read_row()
        .unwrap()
        .unwrap();
    assert_eq!(row.cursor, Cursor::new("c1"));
    assert_eq!(row.version, 2);
}

#[tokio::test]
async fn test_cleared_row_bootstraps_again() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cursor.db");
    let store = SqliteCursorStore::open(&path, PARTITION, ROW).unwrap();
    store.put(&Cursor::new("c7")).await.unwrap();
    store.clear().unwrap();

    let outcome = reconciler(store.clone()).run_pass().await.unwrap();

    assert!(outcome.bootstrapped);
    assert_eq!(store.get().await.unwrap(), Some(Cursor::new("c0")));
}

#[tokio::test]
async fn test_unwritable_location_is_a_storage_error() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"file").unwrap();

    let err = SqliteCursorStore::open(blocker.join("cursor.db"), PARTITION, ROW)
        .err()
        .unwrap();
    assert_eq!(err.kind, ErrorKind::IO);
}
