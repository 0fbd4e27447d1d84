//! Per-pass working set: classification, dedup and mutation planning
//!
//! ```text
//! [ChangeRecord] ──classify──▶ ChangeSet { known_removes, out_of_scope, changed }
//!                                    │ resolve each distinct target once
//!                                    ▼
//!                          PlanBuilder ──build──▶ MutationPlan { removals, upserts }
//! ```
//!
//! Every map here is keyed by [`ObjectId`]; iteration order is the id order so
//! plans are deterministic regardless of resolution completion order.

use std::collections::BTreeMap;

use crate::config::PassConfig;
use crate::domain::{
    build_document, ChangeRecord, ChangeType, IndexabilityRule, ObjectId, ObjectKey,
    ResolvedSubtree, SearchableDocument,
};

/// A feed batch classified and deduplicated by identity.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    known_removes: BTreeMap<ObjectId, ObjectKey>,
    out_of_scope: BTreeMap<ObjectId, ObjectKey>,
    changed: BTreeMap<ObjectId, ObjectKey>,
    record_count: usize,
    filtered: usize,
}

impl ChangeSet {
    pub fn classify(records: &[ChangeRecord], config: &PassConfig) -> Self {
        let mut set = ChangeSet {
            record_count: records.len(),
            ..Default::default()
        };

        for record in records {
            let key = record.key();
            if !config.allows_collection(&record.collection) {
                set.filtered += 1;
                set.out_of_scope.entry(key.object_id.clone()).or_insert(key);
                continue;
            }
            let bucket = match record.change_type {
                ChangeType::Deleted => &mut set.known_removes,
                ChangeType::Changed => &mut set.changed,
            };
            bucket.entry(key.object_id.clone()).or_insert(key);
        }

        set
    }

    /// Identities the feed reported as deleted (no resolution needed).
    pub fn known_removes(&self) -> impl Iterator<Item = &ObjectKey> {
        self.known_removes.values()
    }

    /// Identities whose record falls outside the collection allow-list.
    ///
    /// They are never resolved; any row they left behind is removed.
    pub fn out_of_scope(&self) -> impl Iterator<Item = &ObjectKey> {
        self.out_of_scope.values()
    }

    /// Distinct identities reported as changed.
    pub fn changed(&self) -> impl Iterator<Item = &ObjectKey> {
        self.changed.values()
    }

    pub fn is_known_remove(&self, object_id: &ObjectId) -> bool {
        self.known_removes.contains_key(object_id)
    }

    pub fn record_count(&self) -> usize {
        self.record_count
    }

    pub fn filtered(&self) -> usize {
        self.filtered
    }

    pub fn is_empty(&self) -> bool {
        self.known_removes.is_empty() && self.out_of_scope.is_empty() && self.changed.is_empty()
    }
}

/// Why an identity ends up in the remove set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveReason {
    /// Feed said `deleted`
    Deleted,
    /// Resolver found nothing upstream
    NotFound,
    /// Resolved root lacks the public-location attribute
    NotIndexable,
    /// Upstream answered with another codename or a fallback language
    Mismatch,
    /// Collection is not in the allow-list
    OutOfScope,
}

impl RemoveReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoveReason::Deleted => "deleted",
            RemoveReason::NotFound => "not_found",
            RemoveReason::NotIndexable => "not_indexable",
            RemoveReason::Mismatch => "mismatch",
            RemoveReason::OutOfScope => "out_of_scope",
        }
    }

    /// Known from the feed record alone, without resolving the item.
    pub fn is_feed_driven(&self) -> bool {
        matches!(self, RemoveReason::Deleted | RemoveReason::OutOfScope)
    }
}

/// Classified result of resolving one target.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Upsert(SearchableDocument),
    Remove(RemoveReason),
}

impl Resolution {
    /// Apply the indexability decision to a resolver answer.
    pub fn decide(
        key: &ObjectKey,
        resolved: Option<ResolvedSubtree>,
        rule: &IndexabilityRule,
    ) -> Self {
        let subtree = match resolved {
            Some(subtree) => subtree,
            None => return Resolution::Remove(RemoveReason::NotFound),
        };
        if subtree.root.codename() != key.codename || subtree.root.language() != key.language {
            return Resolution::Remove(RemoveReason::Mismatch);
        }
        if !rule.in_scope(&subtree.root) {
            return Resolution::Remove(RemoveReason::OutOfScope);
        }
        if !rule.is_indexable(&subtree.root) {
            return Resolution::Remove(RemoveReason::NotIndexable);
        }
        Resolution::Upsert(build_document(&subtree, rule))
    }
}

/// The mutations one pass applies, removals first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MutationPlan {
    pub removals: Vec<ObjectId>,
    pub upserts: Vec<SearchableDocument>,
    /// Identities left out because they could not be resolved
    pub skipped: Vec<ObjectKey>,
    /// Identities whose owning documents could not be looked up
    pub unresolved_owners: Vec<ObjectKey>,
}

impl MutationPlan {
    pub fn is_empty(&self) -> bool {
        self.removals.is_empty() && self.upserts.is_empty()
    }

    pub fn upsert_ids(&self) -> Vec<ObjectId> {
        self.upserts.iter().map(|d| d.object_id.clone()).collect()
    }
}

/// Accumulates resolutions into a [`MutationPlan`].
#[derive(Debug, Default)]
pub struct PlanBuilder {
    removals: BTreeMap<ObjectId, RemoveReason>,
    upserts: BTreeMap<ObjectId, SearchableDocument>,
    skipped: BTreeMap<ObjectId, ObjectKey>,
    unresolved_owners: BTreeMap<ObjectId, ObjectKey>,
}

impl PlanBuilder {
    /// Seed the remove set with the feed's known deletions and out-of-scope records.
    pub fn new(change_set: &ChangeSet) -> Self {
        let mut removals: BTreeMap<ObjectId, RemoveReason> = change_set
            .known_removes()
            .map(|key| (key.object_id.clone(), RemoveReason::Deleted))
            .collect();
        for key in change_set.out_of_scope() {
            removals
                .entry(key.object_id.clone())
                .or_insert(RemoveReason::OutOfScope);
        }
        Self {
            removals,
            ..Default::default()
        }
    }

    pub fn record(&mut self, resolution: Resolution, key: &ObjectKey) {
        match resolution {
            Resolution::Upsert(document) => {
                self.upserts.insert(document.object_id.clone(), document);
            }
            Resolution::Remove(reason) => {
                self.removals.entry(key.object_id.clone()).or_insert(reason);
            }
        }
    }

    /// Drop whatever resolution decided for an identity that failed to resolve.
    ///
    /// A removal known from the feed itself is kept: no later change record
    /// would bring it back.
    pub fn skip(&mut self, key: ObjectKey) {
        self.upserts.remove(&key.object_id);
        if let Some(reason) = self.removals.get(&key.object_id) {
            if !reason.is_feed_driven() {
                self.removals.remove(&key.object_id);
            }
        }
        self.skipped.insert(key.object_id.clone(), key);
    }

    /// Note an identity whose owners could not be found; its own outcome stands.
    pub fn owners_unresolved(&mut self, key: ObjectKey) {
        self.unresolved_owners.insert(key.object_id.clone(), key);
    }

    pub fn removal_reason(&self, object_id: &ObjectId) -> Option<RemoveReason> {
        self.removals.get(object_id).copied()
    }

    /// Reduce the remove set by every identity that ends up upserted.
    pub fn build(self) -> MutationPlan {
        let PlanBuilder {
            removals,
            upserts,
            skipped,
            unresolved_owners,
        } = self;

        let removals = removals
            .into_keys()
            .filter(|id| !upserts.contains_key(id))
            .collect();

        MutationPlan {
            removals,
            upserts: upserts.into_values().collect(),
            skipped: skipped.into_values().collect(),
            unresolved_owners: unresolved_owners.into_values().collect(),
        }
    }
}
