//! In-memory adapters (tests and dry runs)

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::{Cursor, ObjectId, SearchableDocument};
use crate::ports::{CursorStore, IndexSink, PortResult};

/// Single-slot cursor store with an atomic compare-and-put.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCursorStore {
    cursor: Arc<Mutex<Option<Cursor>>>,
}

impl InMemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cursor(cursor: Cursor) -> Self {
        Self {
            cursor: Arc::new(Mutex::new(Some(cursor))),
        }
    }

    /// Current value without going through the async port.
    pub fn current(&self) -> Option<Cursor> {
        self.cursor.lock().clone()
    }
}

#[async_trait]
impl CursorStore for InMemoryCursorStore {
    async fn get(&self) -> PortResult<Option<Cursor>> {
        Ok(self.cursor.lock().clone())
    }

    async fn put(&self, cursor: &Cursor) -> PortResult<()> {
        *self.cursor.lock() = Some(cursor.clone());
        Ok(())
    }

    async fn compare_and_put(&self, expected: Option<&Cursor>, next: &Cursor) -> PortResult<bool> {
        let mut slot = self.cursor.lock();
        if slot.as_ref() != expected {
            return Ok(false);
        }
        *slot = Some(next.clone());
        Ok(true)
    }
}

/// HashMap-backed index keyed by ObjectId.
#[derive(Debug, Clone, Default)]
pub struct InMemoryIndex {
    documents: Arc<Mutex<HashMap<ObjectId, SearchableDocument>>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the index with documents (e.g. a previous pass's state).
    pub fn with_documents(documents: impl IntoIterator<Item = SearchableDocument>) -> Self {
        let index = Self::new();
        {
            let mut map = index.documents.lock();
            for doc in documents {
                map.insert(doc.object_id.clone(), doc);
            }
        }
        index
    }

    pub fn get(&self, object_id: &ObjectId) -> Option<SearchableDocument> {
        self.documents.lock().get(object_id).cloned()
    }

    pub fn contains(&self, object_id: &ObjectId) -> bool {
        self.documents.lock().contains_key(object_id)
    }

    pub fn len(&self) -> usize {
        self.documents.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.lock().is_empty()
    }

    /// All documents sorted by ObjectId.
    pub fn snapshot(&self) -> Vec<SearchableDocument> {
        let mut docs: Vec<_> = self.documents.lock().values().cloned().collect();
        docs.sort_by(|a, b| a.object_id.cmp(&b.object_id));
        docs
    }
}

#[async_trait]
impl IndexSink for InMemoryIndex {
    async fn upsert_many(&self, documents: &[SearchableDocument]) -> PortResult<Vec<ObjectId>> {
        let mut map = self.documents.lock();
        Ok(documents
            .iter()
            .map(|doc| {
                map.insert(doc.object_id.clone(), doc.clone());
                doc.object_id.clone()
            })
            .collect())
    }

    async fn remove_many(&self, object_ids: &[ObjectId]) -> PortResult<Vec<ObjectId>> {
        let mut map = self.documents.lock();
        Ok(object_ids
            .iter()
            .filter(|id| map.remove(*id).is_some())
            .cloned()
            .collect())
    }

    async fn find_by_codename_and_language(
        &self,
        codename: &str,
        language: &str,
    ) -> PortResult<Vec<SearchableDocument>> {
        let map = self.documents.lock();
        let mut owners: Vec<_> = map
            .values()
            .filter(|doc| {
                doc.content
                    .iter()
                    .any(|block| block.codename == codename && block.language == language)
            })
            .cloned()
            .collect();
        owners.sort_by(|a, b| a.object_id.cmp(&b.object_id));
        Ok(owners)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{object_id, ContentBlock};

    fn doc(codename: &str, blocks: &[&str]) -> SearchableDocument {
        SearchableDocument {
            object_id: object_id(codename, "en"),
            codename: codename.to_string(),
            language: "en".to_string(),
            name: codename.to_string(),
            slug: codename.to_string(),
            collection: "default".to_string(),
            content: blocks
                .iter()
                .map(|b| ContentBlock {
                    codename: b.to_string(),
                    name: b.to_string(),
                    item_type: "component".to_string(),
                    language: "en".to_string(),
                    contents: String::new(),
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_cursor_compare_and_put() {
        let store = InMemoryCursorStore::new();
        assert!(store.compare_and_put(None, &Cursor::new("c1")).await.unwrap());
        assert!(!store.compare_and_put(None, &Cursor::new("c2")).await.unwrap());
        assert!(store
            .compare_and_put(Some(&Cursor::new("c1")), &Cursor::new("c2"))
            .await
            .unwrap());
        assert_eq!(store.current(), Some(Cursor::new("c2")));
    }

    #[tokio::test]
    async fn test_remove_reports_only_present_ids() {
        let index = InMemoryIndex::with_documents(vec![doc("a", &["a"])]);
        let removed = index
            .remove_many(&[object_id("a", "en"), object_id("missing", "en")])
            .await
            .unwrap();
        assert_eq!(removed, vec![object_id("a", "en")]);
        assert!(index.is_empty());

        // idempotent
        assert!(index.remove_many(&[object_id("a", "en")]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_identity() {
        let index = InMemoryIndex::new();
        index.upsert_many(&[doc("a", &["a"])]).await.unwrap();
        index.upsert_many(&[doc("a", &["a", "b"])]).await.unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.get(&object_id("a", "en")).unwrap().content.len(), 2);
    }

    #[tokio::test]
    async fn test_find_owners_by_block() {
        let index = InMemoryIndex::with_documents(vec![
            doc("home", &["home", "hero"]),
            doc("about", &["about", "hero"]),
            doc("contact", &["contact"]),
        ]);
        let owners = index.find_by_codename_and_language("hero", "en").await.unwrap();
        let mut names: Vec<_> = owners.iter().map(|d| d.codename.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["about", "home"]);
        assert!(index
            .find_by_codename_and_language("hero", "de")
            .await
            .unwrap()
            .is_empty());
    }
}
