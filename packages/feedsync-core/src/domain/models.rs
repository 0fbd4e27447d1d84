//! Domain models shared by the engine and its adapters
//!
//! - `Cursor`: opaque change-feed position
//! - `ChangeRecord`: one entry of the change feed
//! - `ContentItem`: a delivered content node (root or transcluded component)
//! - `ResolvedSubtree`: root item plus everything it transcludes
//! - `SearchableDocument`: the projection written to the search index

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;

use super::identity::{ObjectId, ObjectKey};

// ═══════════════════════════════════════════════════════════════════════════
// Feed
// ═══════════════════════════════════════════════════════════════════════════

/// Opaque change-feed position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of change announced by the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Changed,
    Deleted,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Changed => "changed",
            ChangeType::Deleted => "deleted",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable change-feed entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Upstream item id (informational, not used for identity)
    #[serde(default)]
    pub id: String,
    pub codename: String,
    pub language: String,
    pub change_type: ChangeType,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub collection: String,
    #[serde(rename = "type", default)]
    pub item_type: String,
}

impl ChangeRecord {
    pub fn new(
        codename: impl Into<String>,
        language: impl Into<String>,
        change_type: ChangeType,
    ) -> Self {
        Self {
            id: String::new(),
            codename: codename.into(),
            language: language.into(),
            change_type,
            timestamp: Utc::now(),
            collection: "default".to_string(),
            item_type: String::new(),
        }
    }

    pub fn changed(codename: impl Into<String>, language: impl Into<String>) -> Self {
        Self::new(codename, language, ChangeType::Changed)
    }

    pub fn deleted(codename: impl Into<String>, language: impl Into<String>) -> Self {
        Self::new(codename, language, ChangeType::Deleted)
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.codename.clone(), self.language.clone())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Content
// ═══════════════════════════════════════════════════════════════════════════

/// System metadata of a delivered item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSystem {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub codename: String,
    pub language: String,
    #[serde(rename = "type", default)]
    pub item_type: String,
    #[serde(default)]
    pub collection: String,
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
}

/// One element (field) of a content item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    #[serde(rename = "type")]
    pub element_type: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: serde_json::Value,
    /// Components and linked items embedded in rich text
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modular_content: Vec<String>,
}

impl Element {
    pub const TEXT: &'static str = "text";
    pub const RICH_TEXT: &'static str = "rich_text";
    pub const LINKED_ITEMS: &'static str = "modular_content";

    /// String value, if the element holds one.
    pub fn as_text(&self) -> Option<&str> {
        self.value.as_str()
    }
}

/// A delivered content node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub system: ItemSystem,
    #[serde(default)]
    pub elements: BTreeMap<String, Element>,
}

impl ContentItem {
    pub fn codename(&self) -> &str {
        &self.system.codename
    }

    pub fn language(&self) -> &str {
        &self.system.language
    }

    pub fn element(&self, codename: &str) -> Option<&Element> {
        self.elements.get(codename)
    }

    /// Codenames of every item this one transcludes, in element order.
    pub fn linked_codenames(&self) -> Vec<&str> {
        let mut linked = Vec::new();
        for element in self.elements.values() {
            if element.element_type == Element::LINKED_ITEMS {
                if let Some(values) = element.value.as_array() {
                    linked.extend(values.iter().filter_map(|v| v.as_str()));
                }
            }
            linked.extend(element.modular_content.iter().map(String::as_str));
        }
        linked
    }
}

/// A resolved root item plus all items it transcludes.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSubtree {
    pub root: ContentItem,
    pub related: Vec<ContentItem>,
}

impl ResolvedSubtree {
    pub fn new(root: ContentItem, related: Vec<ContentItem>) -> Self {
        Self { root, related }
    }

    /// Collect the transitive closure of `root`'s linked items from `pool`.
    ///
    /// Cycles and references to items missing from the pool are skipped; the
    /// root itself never appears in `related`.
    pub fn from_linked(root: ContentItem, pool: &HashMap<String, ContentItem>) -> Self {
        let mut seen: HashSet<String> = HashSet::new();
        seen.insert(root.codename().to_string());

        let mut queue: VecDeque<&str> = root.linked_codenames().into_iter().collect();
        let mut related = Vec::new();

        while let Some(codename) = queue.pop_front() {
            if !seen.insert(codename.to_string()) {
                continue;
            }
            if let Some(item) = pool.get(codename) {
                queue.extend(item.linked_codenames());
                related.push(item.clone());
            }
        }

        Self { root, related }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Index projection
// ═══════════════════════════════════════════════════════════════════════════

/// Searchable text of one item inside a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBlock {
    pub codename: String,
    pub name: String,
    pub item_type: String,
    pub language: String,
    pub contents: String,
}

/// The document written to the search index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchableDocument {
    pub object_id: ObjectId,
    pub codename: String,
    pub language: String,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub collection: String,
    pub content: Vec<ContentBlock>,
}

impl SearchableDocument {
    /// Whether one of the document's blocks comes from `codename`.
    pub fn contains_item(&self, codename: &str) -> bool {
        self.content.iter().any(|block| block.codename == codename)
    }
}
