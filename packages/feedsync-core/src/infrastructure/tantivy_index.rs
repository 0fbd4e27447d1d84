//! Tantivy-backed [`IndexSink`]
//!
//! ```text
//! SearchableDocument → TantivyDocument (keyword ids + text + JSON payload) → IndexWriter → commit → reload
//! ```
//!
//! Every mutation call is one commit. Upsert is `delete_term(object_id)` +
//! `add_document`, so re-upserting identical content leaves exactly one
//! document. A failed call rolls the writer back to the last commit.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tantivy::{
    collector::{Count, DocSetCollector, TopDocs},
    directory::MmapDirectory,
    doc,
    query::{BooleanQuery, Occur, Query, QueryParser, TermQuery},
    schema::{IndexRecordOption, Value},
    DateTime, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term,
};
use tracing::{debug, info};

use super::index_schema::{build_schema, SchemaFields};
use crate::domain::{ObjectId, SearchableDocument};
use crate::error::PortError;
use crate::ports::{IndexSink, PortResult};

/// One search result.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct SearchHit {
    pub object_id: String,
    pub codename: String,
    pub language: String,
    pub name: String,
    pub slug: String,
    pub score: f32,
}

#[derive(Clone)]
pub struct TantivyIndexSink {
    index: Index,
    writer: Arc<Mutex<IndexWriter>>,
    reader: IndexReader,
    fields: SchemaFields,
}

fn index_error(context: &'static str) -> impl Fn(tantivy::TantivyError) -> PortError {
    move |e| PortError::new(format!("{}: {}", context, e)).with_source(e)
}

/// Commits and segment merges block; keep them off the async workers.
async fn run_blocking<T, F>(operation: &'static str, f: F) -> PortResult<T>
where
    F: FnOnce() -> PortResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        PortError::new(format!("{} task did not complete: {}", operation, e)).with_source(e)
    })?
}

impl TantivyIndexSink {
    /// Open the index at `path`, creating it (and the directory) if needed.
    pub fn open(path: &Path, writer_heap_bytes: usize) -> PortResult<Self> {
        std::fs::create_dir_all(path).map_err(|e| {
            PortError::new(format!("Failed to create index dir {}: {}", path.display(), e))
                .with_source(e)
        })?;
        let directory = MmapDirectory::open(path).map_err(|e| {
            PortError::new(format!("Failed to open index dir {}: {}", path.display(), e))
                .with_source(e)
        })?;
        let index = Index::open_or_create(directory, build_schema())
            .map_err(index_error("Failed to open index"))?;
        info!("Opened search index at {}", path.display());
        Self::with_index(index, writer_heap_bytes)
    }

    /// Throwaway in-RAM index (tests, dry runs).
    pub fn in_ram(writer_heap_bytes: usize) -> PortResult<Self> {
        Self::with_index(Index::create_in_ram(build_schema()), writer_heap_bytes)
    }

    fn with_index(index: Index, writer_heap_bytes: usize) -> PortResult<Self> {
        let fields = SchemaFields::from_schema(index.schema())
            .map_err(index_error("Incompatible index schema"))?;
        let writer: IndexWriter = index
            .writer_with_num_threads(1, writer_heap_bytes)
            .map_err(index_error("Failed to create writer"))?;
        let reader: IndexReader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(index_error("Failed to create reader"))?;

        Ok(Self {
            index,
            writer: Arc::new(Mutex::new(writer)),
            reader,
            fields,
        })
    }

    /// Number of live documents as of the last commit.
    pub fn num_docs(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    /// Full-text search over name and contents (BM25).
    pub fn search(&self, query: &str, limit: usize) -> PortResult<Vec<SearchHit>> {
        let searcher = self.reader.searcher();
        let parser =
            QueryParser::for_index(&self.index, vec![self.fields.name, self.fields.contents]);
        let parsed = parser
            .parse_query(query)
            .map_err(|e| PortError::new(format!("Invalid query: {}", e)).with_source(e))?;

        let top_docs = searcher
            .search(&parsed, &TopDocs::with_limit(limit))
            .map_err(index_error("Search failed"))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let doc: TantivyDocument = searcher
                .doc(address)
                .map_err(index_error("Failed to retrieve doc"))?;
            hits.push(SearchHit {
                object_id: self.text(&doc, self.fields.object_id),
                codename: self.text(&doc, self.fields.codename),
                language: self.text(&doc, self.fields.language),
                name: self.text(&doc, self.fields.name),
                slug: self.text(&doc, self.fields.slug),
                score,
            });
        }
        Ok(hits)
    }

    /// Stored document for an identity, if indexed.
    pub fn get(&self, object_id: &ObjectId) -> PortResult<Option<SearchableDocument>> {
        let searcher = self.reader.searcher();
        let query = self.id_query(object_id);
        let top = searcher
            .search(&query, &TopDocs::with_limit(1))
            .map_err(index_error("Lookup failed"))?;
        match top.into_iter().next() {
            Some((_, address)) => {
                let doc: TantivyDocument = searcher
                    .doc(address)
                    .map_err(index_error("Failed to retrieve doc"))?;
                self.decode_payload(&doc).map(Some)
            }
            None => Ok(None),
        }
    }

    fn text(&self, doc: &TantivyDocument, field: tantivy::schema::Field) -> String {
        doc.get_first(field)
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string()
    }

    fn decode_payload(&self, doc: &TantivyDocument) -> PortResult<SearchableDocument> {
        let payload = doc
            .get_first(self.fields.payload)
            .and_then(|v| v.as_str())
            .ok_or_else(|| PortError::new("Indexed document has no payload"))?;
        Ok(serde_json::from_str(payload)?)
    }

    fn id_query(&self, object_id: &ObjectId) -> TermQuery {
        TermQuery::new(
            Term::from_field_text(self.fields.object_id, object_id.as_str()),
            IndexRecordOption::Basic,
        )
    }

    fn build_document(&self, document: &SearchableDocument) -> PortResult<TantivyDocument> {
        let payload = serde_json::to_string(document)?;
        let indexed_at = DateTime::from_timestamp_secs(chrono::Utc::now().timestamp());

        let mut doc = doc!(
            self.fields.object_id => document.object_id.to_string(),
            self.fields.codename => document.codename.clone(),
            self.fields.language => document.language.clone(),
            self.fields.name => document.name.clone(),
            self.fields.slug => document.slug.clone(),
            self.fields.payload => payload,
            self.fields.indexed_at => indexed_at,
        );

        let mut seen = HashSet::new();
        for block in &document.content {
            if seen.insert(block.codename.as_str()) {
                doc.add_text(self.fields.block_codename, &block.codename);
            }
            if !block.contents.is_empty() {
                doc.add_text(self.fields.contents, &block.contents);
            }
        }
        Ok(doc)
    }

    /// Run `stage` against the writer, then commit; roll back on any failure.
    fn write<F>(&self, operation: &'static str, stage: F) -> PortResult<()>
    where
        F: FnOnce(&mut IndexWriter) -> PortResult<()>,
    {
        let mut writer = self.writer.lock();

        let result = stage(&mut writer).and_then(|()| {
            writer
                .commit()
                .map(|_| ())
                .map_err(index_error("Failed to commit"))
        });

        if let Err(e) = result {
            // discard the pending operations so the next call starts clean
            writer
                .rollback()
                .map_err(index_error("Failed to roll back after error"))?;
            return Err(
                PortError::new(format!("{} failed: {}", operation, e.message)).with_source(e),
            );
        }
        drop(writer);

        self.reader
            .reload()
            .map_err(index_error("Failed to reload reader"))
    }

    fn upsert_blocking(&self, documents: &[SearchableDocument]) -> PortResult<Vec<ObjectId>> {
        let built = documents
            .iter()
            .map(|d| self.build_document(d))
            .collect::<PortResult<Vec<_>>>()?;

        self.write("Upsert", |writer| {
            for (document, doc) in documents.iter().zip(built) {
                writer.delete_term(Term::from_field_text(
                    self.fields.object_id,
                    document.object_id.as_str(),
                ));
                writer
                    .add_document(doc)
                    .map_err(index_error("Failed to add document"))?;
            }
            Ok(())
        })?;

        Ok(documents.iter().map(|d| d.object_id.clone()).collect())
    }

    /// Deletes only ids that are present and returns those.
    fn remove_blocking(&self, object_ids: &[ObjectId]) -> PortResult<Vec<ObjectId>> {
        let searcher = self.reader.searcher();
        let mut present = Vec::new();
        for object_id in object_ids {
            let hits = searcher
                .search(&self.id_query(object_id), &Count)
                .map_err(index_error("Existence check failed"))?;
            if hits > 0 {
                present.push(object_id.clone());
            }
        }

        if present.is_empty() {
            return Ok(present);
        }

        self.write("Remove", |writer| {
            for object_id in &present {
                writer.delete_term(Term::from_field_text(self.fields.object_id, object_id.as_str()));
            }
            Ok(())
        })?;

        Ok(present)
    }
}

#[async_trait]
impl IndexSink for TantivyIndexSink {
    async fn upsert_many(&self, documents: &[SearchableDocument]) -> PortResult<Vec<ObjectId>> {
        let start = Instant::now();
        let sink = self.clone();
        let owned = documents.to_vec();
        let upserted = run_blocking("Upsert", move || sink.upsert_blocking(&owned)).await?;

        debug!(
            "Upserted {} documents in {:.2}ms",
            upserted.len(),
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(upserted)
    }

    async fn remove_many(&self, object_ids: &[ObjectId]) -> PortResult<Vec<ObjectId>> {
        let sink = self.clone();
        let owned = object_ids.to_vec();
        run_blocking("Remove", move || sink.remove_blocking(&owned)).await
    }

    async fn find_by_codename_and_language(
        &self,
        codename: &str,
        language: &str,
    ) -> PortResult<Vec<SearchableDocument>> {
        let searcher = self.reader.searcher();
        let clauses: Vec<(Occur, Box<dyn Query>)> = vec![
            (
                Occur::Must,
                Box::new(TermQuery::new(
                    Term::from_field_text(self.fields.block_codename, codename),
                    IndexRecordOption::Basic,
                )),
            ),
            (
                Occur::Must,
                Box::new(TermQuery::new(
                    Term::from_field_text(self.fields.language, language),
                    IndexRecordOption::Basic,
                )),
            ),
        ];
        let addresses = searcher
            .search(&BooleanQuery::new(clauses), &DocSetCollector)
            .map_err(index_error("Owner lookup failed"))?;

        let mut owners = Vec::with_capacity(addresses.len());
        for address in addresses {
            let doc: TantivyDocument = searcher
                .doc(address)
                .map_err(index_error("Failed to retrieve doc"))?;
            let document = self.decode_payload(&doc)?;
            if document
                .content
                .iter()
                .any(|b| b.codename == codename && b.language == language)
            {
                owners.push(document);
            }
        }
        owners.sort_by(|a, b| a.object_id.cmp(&b.object_id));
        Ok(owners)
    }
}
