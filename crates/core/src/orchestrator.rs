use crate::config::EngineConfig;
use crate::error::{IngestError, SearchError, StoreError};
use crate::index::InvertedIndex;
use crate::ingest::{DocumentLocks, IngestionPipeline};
use crate::models::{
    Document, DocumentId, DocumentStatus, DocumentSummary, MimeKind, ScoredResult, SearchPage,
};
use crate::search::{CancelFlag, QueryEngine};
use crate::tokenizer::Tokenizer;
use crate::traits::DocumentStore;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Owns the index and wires the pipeline and query engine to one store.
pub struct SearchEngine {
    index: Arc<InvertedIndex>,
    tokenizer: Arc<Tokenizer>,
    store: Arc<dyn DocumentStore>,
    pipeline: IngestionPipeline,
    queries: QueryEngine,
    locks: DocumentLocks,
    config: EngineConfig,
}

impl SearchEngine {
    /// Builds an empty index and re-indexes every indexed record in `store`.
    ///
    /// Records still pending were interrupted mid-ingestion and are marked failed.
    pub async fn open(
        store: Arc<dyn DocumentStore>,
        config: EngineConfig,
    ) -> Result<Self, IngestError> {
        let index = Arc::new(InvertedIndex::new());
        let tokenizer = Arc::new(Tokenizer::new(&config.tokenizer));
        let locks = DocumentLocks::default();

        let engine = Self {
            pipeline: IngestionPipeline::new(
                Arc::clone(&index),
                Arc::clone(&tokenizer),
                Arc::clone(&store),
                config.ingestion.clone(),
                locks.clone(),
            ),
            queries: QueryEngine::new(
                Arc::clone(&index),
                Arc::clone(&tokenizer),
                Arc::clone(&store),
                config.scoring.clone(),
            ),
            index,
            tokenizer,
            store,
            locks,
            config,
        };

        engine.restore().await?;
        Ok(engine)
    }

    async fn restore(&self) -> Result<(), IngestError> {
        let mut restored = 0usize;
        let mut interrupted = 0usize;

        for mut document in self.store.list().await? {
            match document.status {
                DocumentStatus::Indexed => {
                    let tokens = self.tokenizer.tokenize(&document.text);
                    self.index.add_document(&document.id, &tokens)?;
                    restored += 1;
                }
                DocumentStatus::Pending => {
                    warn!(document_id = %document.id, filename = %document.filename, "ingestion was interrupted");
                    document.status = DocumentStatus::Failed;
                    document.failure = Some("ingestion was interrupted".to_string());
                    self.store.put(&document, None).await?;
                    interrupted += 1;
                }
                DocumentStatus::Failed => {}
            }
        }

        info!(
            documents = restored,
            interrupted,
            terms = self.index.term_count(),
            "search engine ready"
        );
        Ok(())
    }

    pub async fn ingest(
        &self,
        filename: &str,
        bytes: Vec<u8>,
        kind: MimeKind,
    ) -> Result<Document, IngestError> {
        self.pipeline.ingest(filename, bytes, kind).await
    }

    /// Like [`SearchEngine::ingest`], taking the kind from the file extension.
    pub async fn ingest_file(&self, filename: &str, bytes: Vec<u8>) -> Result<Document, IngestError> {
        let kind = MimeKind::from_filename(filename)?;
        self.ingest(filename, bytes, kind).await
    }

    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<ScoredResult>, SearchError> {
        Ok(self.search_page(query, top_k).await?.results)
    }

    /// Ranked results plus the number of matching documents, bounded by the
    /// request timeout.
    pub async fn search_page(&self, query: &str, top_k: usize) -> Result<SearchPage, SearchError> {
        let cancel = CancelFlag::with_deadline(Instant::now() + self.config.ingestion.request_timeout);
        self.search_with(query, top_k, &cancel).await
    }

    pub async fn search_with(
        &self,
        query: &str,
        top_k: usize,
        cancel: &CancelFlag,
    ) -> Result<SearchPage, SearchError> {
        self.queries.search(query, top_k, cancel).await
    }

    /// Library listing ordered by filename.
    pub async fn documents(&self) -> Result<Vec<DocumentSummary>, StoreError> {
        let mut summaries: Vec<DocumentSummary> = self
            .store
            .list()
            .await?
            .iter()
            .map(Document::summary)
            .collect();
        summaries.sort_by(|left, right| {
            left.filename
                .cmp(&right.filename)
                .then_with(|| left.document_id.cmp(&right.document_id))
        });
        Ok(summaries)
    }

    pub async fn document(&self, id: &DocumentId) -> Result<Option<Document>, StoreError> {
        self.store.get(id).await
    }

    /// Purges the postings and the record. Returns whether the document existed.
    pub async fn remove(&self, id: &DocumentId) -> Result<bool, StoreError> {
        let _guard = self.locks.acquire(id).await;
        let indexed = self.index.remove_document(id);
        let stored = self.store.delete(id).await?;
        if indexed || stored {
            info!(document_id = %id, "document removed");
        }
        Ok(indexed || stored)
    }

    /// Removes every document, returning how many were dropped.
    pub async fn reset(&self) -> Result<usize, StoreError> {
        let documents = self.store.list().await?;
        let mut removed = 0;
        for document in &documents {
            if self.remove(&document.id).await? {
                removed += 1;
            }
        }
        info!(removed, "index reset");
        Ok(removed)
    }

    pub async fn flush(&self) -> Result<(), StoreError> {
        self.store.flush().await?;
        info!(documents = self.index.document_count(), "store flushed");
        Ok(())
    }

    pub fn index(&self) -> &InvertedIndex {
        &self.index
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::pdf_with_pages;
    use crate::stores::{FsDocumentStore, MemoryDocumentStore};
    use tempfile::tempdir;

    async fn engine() -> SearchEngine {
        SearchEngine::open(Arc::new(MemoryDocumentStore::new()), EngineConfig::default())
            .await
            .expect("engine opens")
    }

    async fn upload_corpus(engine: &SearchEngine) {
        engine
            .ingest_file("doc1.txt", b"the quick brown fox".to_vec())
            .await
            .expect("doc1 ingests");
        engine
            .ingest_file("doc2.pdf", pdf_with_pages(&["fox jumps over the lazy dog"]))
            .await
            .expect("doc2 ingests");
    }

    #[tokio::test]
    async fn phrase_query_finds_exactly_one_document() {
        let engine = engine().await;
        upload_corpus(&engine).await;

        let results = engine.search(r#""quick brown""#, 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].filename, "doc1.txt");
        assert_eq!(results[0].document_id, DocumentId::from_filename("doc1.txt"));
        assert!(results[0].excerpt.contains("<mark>quick brown</mark>"));
    }

    #[tokio::test]
    async fn term_query_ranks_both_documents() {
        let engine = engine().await;
        upload_corpus(&engine).await;

        let results = engine.search("fox", 10).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|result| result.score > 0.0));
        assert!(results[0].score >= results[1].score);
        let mut names: Vec<&str> = results.iter().map(|result| result.filename.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["doc1.txt", "doc2.pdf"]);
    }

    #[tokio::test]
    async fn unterminated_quote_is_rejected() {
        let engine = engine().await;
        upload_corpus(&engine).await;

        let error = engine.search(r#""quick"#, 10).await.unwrap_err();
        assert!(matches!(error, SearchError::QuerySyntax { .. }));
        assert_eq!(error.kind(), "query_syntax_error");
    }

    #[tokio::test]
    async fn corrupt_upload_leaves_queries_untouched() {
        let engine = engine().await;
        upload_corpus(&engine).await;
        let before = engine.search("fox", 10).await.unwrap();

        let error = engine
            .ingest_file("bad.pdf", b"not a pdf at all".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(error, IngestError::CorruptDocument(_)));

        let id = DocumentId::from_filename("bad.pdf");
        let stored = engine.document(&id).await.unwrap().unwrap();
        assert_eq!(stored.status, DocumentStatus::Failed);
        assert!(!engine.index().contains_document(&id));
        assert_eq!(engine.search("fox", 10).await.unwrap(), before);
    }

    #[tokio::test]
    async fn adjacency_separates_phrase_and_terms() {
        let engine = engine().await;
        engine
            .ingest_file("cars.txt", b"a fast and very red car".to_vec())
            .await
            .unwrap();

        assert!(engine.search(r#""fast car""#, 10).await.unwrap().is_empty());
        assert_eq!(engine.search("fast car", 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn phrases_do_not_cross_pages() {
        let engine = engine().await;
        engine
            .ingest_file("pages.pdf", pdf_with_pages(&["the end of fast", "car chapter two"]))
            .await
            .unwrap();

        assert!(engine.search(r#""fast car""#, 10).await.unwrap().is_empty());
        assert_eq!(engine.search(r#""fast""#, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn top_k_truncates_results() {
        let engine = engine().await;
        for n in 0..5 {
            engine
                .ingest_file(&format!("n{n}.txt"), b"common words".to_vec())
                .await
                .unwrap();
        }

        assert_eq!(engine.search("common", 3).await.unwrap().len(), 3);
        assert_eq!(engine.search("common", 0).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn removal_restores_the_index() {
        let engine = engine().await;
        engine.ingest_file("keep.txt", b"shared words".to_vec()).await.unwrap();
        let shared_before = engine.index().lookup("shared");

        let document = engine
            .ingest_file("temp.txt", b"shared transient".to_vec())
            .await
            .unwrap();
        assert!(engine.remove(&document.id).await.unwrap());

        assert_eq!(engine.index().lookup("shared"), shared_before);
        assert!(engine.index().lookup("transient").is_empty());
        assert!(engine.document(&document.id).await.unwrap().is_none());
        assert!(!engine.remove(&document.id).await.unwrap());
    }

    #[tokio::test]
    async fn unsupported_extension_creates_nothing() {
        let engine = engine().await;
        let error = engine.ingest_file("photo.png", vec![1, 2, 3]).await.unwrap_err();

        assert!(matches!(error, IngestError::UnsupportedFormat(_)));
        assert!(error.is_client_error());
        assert!(engine.documents().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn library_lists_every_upload() {
        let engine = engine().await;
        upload_corpus(&engine).await;
        let _ = engine.ingest_file("zz.pdf", b"junk".to_vec()).await;

        let library = engine.documents().await.unwrap();
        let rows: Vec<(&str, DocumentStatus)> = library
            .iter()
            .map(|row| (row.filename.as_str(), row.status))
            .collect();
        assert_eq!(
            rows,
            vec![
                ("doc1.txt", DocumentStatus::Indexed),
                ("doc2.pdf", DocumentStatus::Indexed),
                ("zz.pdf", DocumentStatus::Failed),
            ]
        );
    }

    #[tokio::test]
    async fn reset_empties_everything() {
        let engine = engine().await;
        upload_corpus(&engine).await;

        assert_eq!(engine.reset().await.unwrap(), 2);
        assert_eq!(engine.index().document_count(), 0);
        assert!(engine.search("fox", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reopening_rebuilds_the_index() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        {
            let store = Arc::new(FsDocumentStore::open(dir.path()).await?);
            let engine = SearchEngine::open(store, EngineConfig::default()).await?;
            upload_corpus(&engine).await;
            engine.flush().await?;
        }

        let store = Arc::new(FsDocumentStore::open(dir.path()).await?);
        let engine = SearchEngine::open(store, EngineConfig::default()).await?;
        assert_eq!(engine.index().document_count(), 2);

        let results = engine.search(r#""lazy dog""#, 10).await?;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].filename, "doc2.pdf");
        Ok(())
    }

    #[tokio::test]
    async fn interrupted_records_are_marked_failed() -> Result<(), Box<dyn std::error::Error>> {
        let store = Arc::new(MemoryDocumentStore::new());
        let pending = Document::pending("half.txt", MimeKind::Text, b"half");
        store.put(&pending, Some(b"half".as_slice())).await?;

        let engine = SearchEngine::open(store, EngineConfig::default()).await?;
        let stored = engine.document(&pending.id).await?.expect("record kept");
        assert_eq!(stored.status, DocumentStatus::Failed);
        assert_eq!(engine.index().document_count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn page_total_counts_every_match() {
        let engine = engine().await;
        for n in 0..4 {
            engine
                .ingest_file(&format!("p{n}.txt"), b"paged term".to_vec())
                .await
                .unwrap();
        }

        let page = engine.search_page("paged", 2).await.unwrap();
        assert_eq!(page.total, 4);
        assert_eq!(page.results.len(), 2);
    }

    #[tokio::test]
    async fn stopwords_are_ignored_when_enabled() {
        let config = EngineConfig {
            tokenizer: crate::config::TokenizerConfig {
                stopwords: true,
                ..Default::default()
            },
            ..EngineConfig::default()
        };
        let engine = SearchEngine::open(Arc::new(MemoryDocumentStore::new()), config)
            .await
            .unwrap();
        engine
            .ingest_file("doc1.txt", b"the quick brown fox".to_vec())
            .await
            .unwrap();

        assert!(engine.search("the", 10).await.unwrap().is_empty());
        assert!(engine.index().lookup("the").is_empty());
        let results = engine.search(r#""quick brown""#, 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].excerpt.contains("<mark>quick brown</mark>"));
    }
}
