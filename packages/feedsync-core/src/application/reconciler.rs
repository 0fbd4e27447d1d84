//! One synchronization pass
//!
//! ```text
//! load cursor ─▶ fetch batch ─▶ classify ─▶ resolve (bounded fan-out) ─▶ plan
//!      │                                                                  │
//!      └─(no cursor) bootstrap ─▶ persist ─▶ done        remove ─▶ upsert ─▶ persist cursor
//! ```
//!
//! The successor cursor is written last, with compare-and-put against the
//! cursor loaded at pass start. Any failure before that point leaves the
//! stored cursor untouched, so the next invocation replays the same batch.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use super::cursor::CursorState;
use super::working_set::{ChangeSet, MutationPlan, PlanBuilder, RemoveReason, Resolution};
use crate::config::{PassConfig, ResolutionFailurePolicy, ResolutionStrategy};
use crate::domain::{Cursor, IndexabilityRule, ObjectId, ObjectKey, ResolvedSubtree};
use crate::error::{MutationStage, PortError, Result, SyncError};
use crate::ports::{ChangeFeedSource, ContentResolver, CursorStore, FeedRequest, IndexSink};

/// Result of one pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PassOutcome {
    /// Identities submitted to `remove_many`
    pub removed: Vec<ObjectId>,
    /// Identities submitted to `upsert_many`
    pub indexed: Vec<ObjectId>,
    /// Identities left out because they could not be resolved
    pub skipped: Vec<ObjectKey>,
    /// Identities whose owning documents could not be looked up
    pub unresolved_owners: Vec<ObjectKey>,
    pub bootstrapped: bool,
    pub records_fetched: usize,
    pub records_filtered: usize,
    /// Resolver calls made
    pub resolutions: usize,
    /// Cursor persisted at the end of the pass
    pub cursor: Cursor,
    pub duration_ms: u64,
}

impl PassOutcome {
    fn bootstrapped(cursor: Cursor, started: Instant) -> Self {
        Self {
            removed: Vec::new(),
            indexed: Vec::new(),
            skipped: Vec::new(),
            unresolved_owners: Vec::new(),
            bootstrapped: true,
            records_fetched: 0,
            records_filtered: 0,
            resolutions: 0,
            cursor,
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.removed.is_empty() && self.indexed.is_empty()
    }
}

/// Identity that could not be resolved, or whose owners could not be looked up.
struct FailedTarget {
    key: ObjectKey,
    source: PortError,
}

/// Drives passes against the four collaborators.
pub struct Reconciler {
    cursor_store: Arc<dyn CursorStore>,
    feed: Arc<dyn ChangeFeedSource>,
    resolver: Arc<dyn ContentResolver>,
    sink: Arc<dyn IndexSink>,
    config: PassConfig,
    rule: IndexabilityRule,
}

impl Reconciler {
    pub fn new(
        cursor_store: Arc<dyn CursorStore>,
        feed: Arc<dyn ChangeFeedSource>,
        resolver: Arc<dyn ContentResolver>,
        sink: Arc<dyn IndexSink>,
        config: PassConfig,
    ) -> Result<Self> {
        config.validate()?;
        let rule = IndexabilityRule::new(config.slug_attribute.clone())
            .with_collections(config.collections.clone());
        Ok(Self {
            cursor_store,
            feed,
            resolver,
            sink,
            config,
            rule,
        })
    }

    pub fn config(&self) -> &PassConfig {
        &self.config
    }

    /// Execute one pass (main entry point)
    pub async fn run_pass(&self) -> Result<PassOutcome> {
        let started = Instant::now();

        let state = CursorState::load(self.cursor_store.as_ref()).await?;
        info!("Starting sync pass (cursor state: {})", state.state_name());

        let current = match state {
            CursorState::NoCursor => {
                let state = state.bootstrap(self.feed.as_ref()).await?;
                let cursor = state.cursor().cloned().ok_or_else(|| {
                    SyncError::CursorUnavailable("bootstrap produced no cursor".to_string())
                })?;
                self.persist_cursor(None, &cursor).await?;
                info!("Stored bootstrap cursor; no mutations this pass");
                return Ok(PassOutcome::bootstrapped(cursor, started));
            }
            CursorState::Bootstrap(cursor) | CursorState::Stored(cursor) => cursor,
        };

        let batch = self
            .feed
            .fetch(&FeedRequest::Continue(current.clone()))
            .await
            .map_err(|e| {
                error!("Change feed fetch failed at cursor {}: {}", current, e);
                SyncError::FeedFetchFailed(e)
            })?;

        let change_set = ChangeSet::classify(&batch.records, &self.config);
        info!(
            "Fetched {} records ({} filtered): {} changed, {} deleted, {} out-of-scope identities",
            change_set.record_count(),
            change_set.filtered(),
            change_set.changed().count(),
            change_set.known_removes().count(),
            change_set.out_of_scope().count()
        );

        let mut builder = PlanBuilder::new(&change_set);
        let mut failures = Vec::new();

        let (targets, lookup_failures) = match self.config.strategy {
            ResolutionStrategy::Direct => (
                change_set
                    .changed()
                    .map(|key| (key.object_id.clone(), key.clone()))
                    .collect(),
                Vec::new(),
            ),
            ResolutionStrategy::IndexedOwners => self.owner_targets(&change_set).await,
        };

        let resolve_start = Instant::now();
        let resolutions = targets.len();
        for (key, result) in self.resolve_all(targets).await {
            match result {
                Ok(resolved) => {
                    let resolution = Resolution::decide(&key, resolved, &self.rule);
                    if let Resolution::Remove(reason) = &resolution {
                        if *reason == RemoveReason::Mismatch {
                            warn!("Resolver answered {} with a different item; removing", key);
                        } else {
                            debug!("{} resolves to removal ({})", key, reason.as_str());
                        }
                    }
                    builder.record(resolution, &key);
                }
                Err(source) => failures.push(FailedTarget { key, source }),
            }
        }
        debug!(
            "Resolved {} targets in {:.2}ms",
            resolutions,
            resolve_start.elapsed().as_secs_f64() * 1000.0
        );

        self.handle_failures(&mut builder, failures, lookup_failures)?;

        let plan = builder.build();
        self.apply(&plan).await?;

        let next = batch.next_cursor;
        self.persist_cursor(Some(&current), &next).await?;

        let outcome = PassOutcome {
            removed: plan.removals.clone(),
            indexed: plan.upsert_ids(),
            skipped: plan.skipped,
            unresolved_owners: plan.unresolved_owners,
            bootstrapped: false,
            records_fetched: change_set.record_count(),
            records_filtered: change_set.filtered(),
            resolutions,
            cursor: next,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            "Sync pass completed - removed {}, indexed {}, skipped {} in {}ms (cursor {})",
            outcome.removed.len(),
            outcome.indexed.len(),
            outcome.skipped.len(),
            outcome.duration_ms,
            outcome.cursor
        );

        Ok(outcome)
    }

    /// Map changed and deleted identities to the documents that contain them.
    ///
    /// A changed identity is always its own target as well; a deleted one
    /// keeps its known removal and only contributes its owners.
    async fn owner_targets(
        &self,
        change_set: &ChangeSet,
    ) -> (BTreeMap<ObjectId, ObjectKey>, Vec<FailedTarget>) {
        let mut targets: BTreeMap<ObjectId, ObjectKey> = change_set
            .changed()
            .map(|key| (key.object_id.clone(), key.clone()))
            .collect();
        let mut failures = Vec::new();

        let keys: Vec<ObjectKey> = change_set
            .changed()
            .chain(change_set.known_removes())
            .cloned()
            .collect();

        let lookups: Vec<_> = stream::iter(keys)
            .map(|key| async move {
                let owners = self
                    .sink
                    .find_by_codename_and_language(&key.codename, &key.language)
                    .await;
                (key, owners)
            })
            .buffer_unordered(self.config.resolve_concurrency)
            .collect()
            .await;

        for (key, owners) in lookups {
            match owners {
                Ok(owners) => {
                    for owner in owners {
                        if owner.object_id == key.object_id {
                            continue;
                        }
                        debug!("{} is contained in {}/{}", key, owner.codename, owner.language);
                        let owner_key = ObjectKey::new(owner.codename, owner.language);
                        targets.entry(owner_key.object_id.clone()).or_insert(owner_key);
                    }
                }
                Err(source) => failures.push(FailedTarget { key, source }),
            }
        }

        (targets, failures)
    }

    /// Resolve every target once; returns only when all have completed.
    async fn resolve_all(
        &self,
        targets: BTreeMap<ObjectId, ObjectKey>,
    ) -> Vec<(ObjectKey, std::result::Result<Option<ResolvedSubtree>, PortError>)> {
        stream::iter(targets.into_values())
            .map(|key| async move {
                let result = self.resolver.resolve(&key.codename, &key.language).await;
                (key, result)
            })
            .buffer_unordered(self.config.resolve_concurrency)
            .collect()
            .await
    }

    /// Resolution failures drop the target's resolved outcome; lookup failures
    /// only drop the owners that could not be found.
    fn handle_failures(
        &self,
        builder: &mut PlanBuilder,
        failures: Vec<FailedTarget>,
        lookup_failures: Vec<FailedTarget>,
    ) -> Result<()> {
        match self.config.resolution_failure_policy {
            ResolutionFailurePolicy::Abort => {
                let first = failures
                    .into_iter()
                    .chain(lookup_failures)
                    .min_by(|a, b| a.key.object_id.cmp(&b.key.object_id));
                if let Some(FailedTarget { key, source }) = first {
                    error!("Resolution failed for {}: {}; aborting pass", key, source);
                    return Err(SyncError::ResolutionFailed {
                        object_id: key.object_id,
                        codename: key.codename,
                        language: key.language,
                        source,
                    });
                }
            }
            ResolutionFailurePolicy::Skip => {
                for FailedTarget { key, source } in failures {
                    warn!("Skipping {} this pass: {}", key, source);
                    builder.skip(key);
                }
                for FailedTarget { key, source } in lookup_failures {
                    warn!("Owners of {} not re-indexed this pass: {}", key, source);
                    builder.owners_unresolved(key);
                }
            }
        }
        Ok(())
    }

    /// Removals first, then upserts; empty halves are not sent.
    async fn apply(&self, plan: &MutationPlan) -> Result<()> {
        if !plan.removals.is_empty() {
            let removed = self.sink.remove_many(&plan.removals).await.map_err(|source| {
                error!("Index removal of {} objects failed: {}", plan.removals.len(), source);
                SyncError::IndexMutationFailed {
                    stage: MutationStage::Remove,
                    object_ids: plan.removals.clone(),
                    removed_before_failure: Vec::new(),
                    source,
                }
            })?;
            debug!(
                "Removed {} of {} submitted objects",
                removed.len(),
                plan.removals.len()
            );
        }

        if !plan.upserts.is_empty() {
            let written = self.sink.upsert_many(&plan.upserts).await.map_err(|source| {
                error!("Index upsert of {} documents failed: {}", plan.upserts.len(), source);
                SyncError::IndexMutationFailed {
                    stage: MutationStage::Upsert,
                    object_ids: plan.upsert_ids(),
                    removed_before_failure: plan.removals.clone(),
                    source,
                }
            })?;
            debug!("Upserted {} documents", written.len());
        }

        Ok(())
    }

    async fn persist_cursor(&self, expected: Option<&Cursor>, next: &Cursor) -> Result<()> {
        let swapped = self
            .cursor_store
            .compare_and_put(expected, next)
            .await
            .map_err(SyncError::CursorStore)?;
        if !swapped {
            let expected = expected.map(Cursor::to_string).unwrap_or_else(|| "<none>".to_string());
            error!("Cursor moved by another writer (expected {})", expected);
            return Err(SyncError::CursorConflict { expected });
        }
        Ok(())
    }
}
