use async_trait::async_trait;
use feedsync_core::config::PassConfig;
use feedsync_core::domain::{
    ChangeRecord, ContentItem, Cursor, ObjectId, ResolvedSubtree, SearchableDocument,
};
use feedsync_core::error::PortError;
use feedsync_core::infrastructure::{InMemoryCursorStore, InMemoryIndex};
use feedsync_core::ports::{
    ChangeFeedSource, ContentResolver, CursorStore, FeedBatch, FeedRequest, IndexSink, PortResult,
};
use feedsync_core::Reconciler;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

// ═══════════════════════════════════════════════════════════════════════════
// Feed
// ═══════════════════════════════════════════════════════════════════════════

/// Change feed replaying fixed batches keyed by the requested cursor.
///
/// An unscripted cursor yields an empty batch that stays on the same cursor.
#[derive(Default)]
pub struct ScriptedFeed {
    bootstrap: Option<Cursor>,
    batches: HashMap<Cursor, (Vec<ChangeRecord>, Cursor)>,
    fail: AtomicBool,
    fetches: Mutex<Vec<FeedRequest>>,
    /// Moves the stored cursor behind the reconciler's back during fetch
    interloper: Option<(Arc<InMemoryCursorStore>, Cursor)>,
}

impl ScriptedFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bootstrap(mut self, cursor: &str) -> Self {
        self.bootstrap = Some(Cursor::new(cursor));
        self
    }

    pub fn with_batch(mut self, from: &str, records: Vec<ChangeRecord>, next: &str) -> Self {
        self.batches
            .insert(Cursor::new(from), (records, Cursor::new(next)));
        self
    }

    pub fn with_interloper(mut self, store: Arc<InMemoryCursorStore>, cursor: &str) -> Self {
        self.interloper = Some((store, Cursor::new(cursor)));
        self
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn fetches(&self) -> Vec<FeedRequest> {
        self.fetches.lock().clone()
    }
}

#[async_trait]
impl ChangeFeedSource for ScriptedFeed {
    async fn fetch(&self, request: &FeedRequest) -> PortResult<FeedBatch> {
        self.fetches.lock().push(request.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(PortError::new("change feed unavailable"));
        }

        match request {
            FeedRequest::Bootstrap => {
                let cursor = self
                    .bootstrap
                    .clone()
                    .ok_or_else(|| PortError::new("no bootstrap cursor"))?;
                Ok(FeedBatch {
                    records: vec![],
                    next_cursor: cursor,
                })
            }
            FeedRequest::Continue(cursor) => {
                if let Some((store, moved)) = &self.interloper {
                    store.put(moved).await?;
                }
                Ok(match self.batches.get(cursor) {
                    Some((records, next)) => FeedBatch {
                        records: records.clone(),
                        next_cursor: next.clone(),
                    },
                    None => FeedBatch {
                        records: vec![],
                        next_cursor: cursor.clone(),
                    },
                })
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Resolver
// ═══════════════════════════════════════════════════════════════════════════

/// Resolver over an in-memory content pool, recording every call.
#[derive(Default)]
pub struct StubResolver {
    items: Mutex<HashMap<(String, String), ContentItem>>,
    failing: Mutex<HashSet<(String, String)>>,
    calls: Mutex<Vec<(String, String)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StubResolver {
    pub fn new(items: Vec<ContentItem>) -> Self {
        let resolver = Self::default();
        for item in items {
            resolver.put(item);
        }
        resolver
    }

    pub fn put(&self, item: ContentItem) {
        self.items.lock().insert(
            (item.codename().to_string(), item.language().to_string()),
            item,
        );
    }

    /// Answer requests for `codename/language` with `item` (e.g. a fallback language).
    pub fn put_as(&self, codename: &str, language: &str, item: ContentItem) {
        self.items
            .lock()
            .insert((codename.to_string(), language.to_string()), item);
    }

    pub fn remove(&self, codename: &str, language: &str) {
        self.items
            .lock()
            .remove(&(codename.to_string(), language.to_string()));
    }

    pub fn fail_on(&self, codename: &str, language: &str) {
        self.failing
            .lock()
            .insert((codename.to_string(), language.to_string()));
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentResolver for StubResolver {
    async fn resolve(&self, codename: &str, language: &str) -> PortResult<Option<ResolvedSubtree>> {
        let key = (codename.to_string(), language.to_string());
        self.calls.lock().push(key.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.lock().contains(&key) {
            return Err(PortError::new(format!("503 for {}/{}", codename, language)));
        }

        let items = self.items.lock();
        let Some(root) = items.get(&key).cloned() else {
            return Ok(None);
        };
        let pool: HashMap<String, ContentItem> = items
            .iter()
            .filter(|((_, lang), _)| lang == language)
            .map(|((codename, _), item)| (codename.clone(), item.clone()))
            .collect();
        Ok(Some(ResolvedSubtree::from_linked(root, &pool)))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Index sink
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkCall {
    Remove(Vec<ObjectId>),
    Upsert(Vec<ObjectId>),
    Lookup(String, String),
}

/// In-memory index with injectable failures and a call log.
#[derive(Default)]
pub struct RecordingSink {
    pub index: InMemoryIndex,
    calls: Mutex<Vec<SinkCall>>,
    fail_remove: AtomicBool,
    fail_upsert: AtomicBool,
    fail_lookup: AtomicBool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_documents(documents: Vec<SearchableDocument>) -> Self {
        Self {
            index: InMemoryIndex::with_documents(documents),
            ..Default::default()
        }
    }

    pub fn fail_remove(&self, fail: bool) {
        self.fail_remove.store(fail, Ordering::SeqCst);
    }

    pub fn fail_upsert(&self, fail: bool) {
        self.fail_upsert.store(fail, Ordering::SeqCst);
    }

    pub fn fail_lookup(&self, fail: bool) {
        self.fail_lookup.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<SinkCall> {
        self.calls.lock().clone()
    }

    /// Mutation calls only (lookups filtered out).
    pub fn mutations(&self) -> Vec<SinkCall> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, SinkCall::Lookup(..)))
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }
}

#[async_trait]
impl IndexSink for RecordingSink {
    async fn upsert_many(&self, documents: &[SearchableDocument]) -> PortResult<Vec<ObjectId>> {
        self.calls.lock().push(SinkCall::Upsert(
            documents.iter().map(|d| d.object_id.clone()).collect(),
        ));
        if self.fail_upsert.load(Ordering::SeqCst) {
            return Err(PortError::new("index rejected upsert"));
        }
        self.index.upsert_many(documents).await
    }

    async fn remove_many(&self, object_ids: &[ObjectId]) -> PortResult<Vec<ObjectId>> {
        self.calls.lock().push(SinkCall::Remove(object_ids.to_vec()));
        if self.fail_remove.load(Ordering::SeqCst) {
            return Err(PortError::new("index rejected removal"));
        }
        self.index.remove_many(object_ids).await
    }

    async fn find_by_codename_and_language(
        &self,
        codename: &str,
        language: &str,
    ) -> PortResult<Vec<SearchableDocument>> {
        self.calls
            .lock()
            .push(SinkCall::Lookup(codename.to_string(), language.to_string()));
        if self.fail_lookup.load(Ordering::SeqCst) {
            return Err(PortError::new("facet lookup failed"));
        }
        self.index.find_by_codename_and_language(codename, language).await
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Harness
// ═══════════════════════════════════════════════════════════════════════════

pub struct Harness {
    pub store: Arc<InMemoryCursorStore>,
    pub feed: Arc<ScriptedFeed>,
    pub resolver: Arc<StubResolver>,
    pub sink: Arc<RecordingSink>,
    pub reconciler: Reconciler,
}

impl Harness {
    pub fn new(
        store: InMemoryCursorStore,
        feed: ScriptedFeed,
        resolver: StubResolver,
        sink: RecordingSink,
        config: PassConfig,
    ) -> Self {
        Self::with_store(Arc::new(store), feed, resolver, sink, config)
    }

    pub fn with_store(
        store: Arc<InMemoryCursorStore>,
        feed: ScriptedFeed,
        resolver: StubResolver,
        sink: RecordingSink,
        config: PassConfig,
    ) -> Self {
        let feed = Arc::new(feed);
        let resolver = Arc::new(resolver);
        let sink = Arc::new(sink);
        let reconciler = Reconciler::new(
            store.clone(),
            feed.clone(),
            resolver.clone(),
            sink.clone(),
            config,
        )
        .expect("valid pass config");
        Self {
            store,
            feed,
            resolver,
            sink,
            reconciler,
        }
    }

    /// Stored cursor `from`, one scripted batch to `next`.
    pub fn one_batch(records: Vec<ChangeRecord>, resolver: StubResolver) -> Self {
        Self::one_batch_with(records, resolver, RecordingSink::new(), PassConfig::default())
    }

    pub fn one_batch_with(
        records: Vec<ChangeRecord>,
        resolver: StubResolver,
        sink: RecordingSink,
        config: PassConfig,
    ) -> Self {
        Self::new(
            InMemoryCursorStore::with_cursor(Cursor::new("c1")),
            ScriptedFeed::new().with_batch("c1", records, "c2"),
            resolver,
            sink,
            config,
        )
    }

    pub fn cursor(&self) -> Option<Cursor> {
        self.store.current()
    }
}
