//! Indexability predicate
//!
//! An item is indexable iff it carries the configured "public location"
//! element (typically a URL slug) with a non-empty string value. Publication state
//! changes independently of the feed's change label, so the predicate is
//! evaluated on every resolved root item and never cached.

use super::models::ContentItem;

/// Decides whether a resolved root item belongs in the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexabilityRule {
    slug_attribute: String,
    /// Collection allow-list; `None` accepts every collection
    collections: Option<Vec<String>>,
}

impl IndexabilityRule {
    pub fn new(slug_attribute: impl Into<String>) -> Self {
        Self {
            slug_attribute: slug_attribute.into(),
            collections: None,
        }
    }

    pub fn with_collections(mut self, collections: Option<Vec<String>>) -> Self {
        self.collections = collections;
        self
    }

    pub fn slug_attribute(&self) -> &str {
        &self.slug_attribute
    }

    /// Whether the item's current collection is allowed in the index.
    pub fn in_scope(&self, item: &ContentItem) -> bool {
        match &self.collections {
            Some(allowed) => allowed.iter().any(|c| *c == item.system.collection),
            None => true,
        }
    }

    pub fn is_indexable(&self, item: &ContentItem) -> bool {
        self.slug(item).is_some()
    }

    /// The public location of an indexable item.
    pub fn slug<'a>(&self, item: &'a ContentItem) -> Option<&'a str> {
        item.element(&self.slug_attribute)
            .and_then(|element| element.as_text())
            .map(str::trim)
            .filter(|slug| !slug.is_empty())
    }
}
