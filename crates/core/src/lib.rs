pub mod config;
pub mod error;
pub mod excerpt;
pub mod extractor;
pub mod index;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod query;
pub mod search;
pub mod stores;
pub mod tokenizer;
pub mod traits;

#[cfg(test)]
mod fixtures;

pub use config::{
    EngineConfig, IngestionOptions, ScoringConfig, TokenizerConfig, DEFAULT_MAX_DOCUMENT_BYTES,
    DEFAULT_REQUEST_TIMEOUT,
};
pub use error::{IndexError, IngestError, SearchError, StoreError};
pub use excerpt::build_excerpt;
pub use extractor::{extract, PageText, PdfExtractor, PlainTextExtractor, PAGE_BOUNDARY};
pub use index::{IndexReader, InvertedIndex, Posting};
pub use ingest::{discover_documents, DocumentGuard, DocumentLocks, IngestionPipeline};
pub use models::{
    Document, DocumentId, DocumentStatus, DocumentSummary, MimeKind, ScoredResult, SearchPage,
};
pub use orchestrator::SearchEngine;
pub use query::{parse_query, Clause, ParsedQuery, PhraseTerm};
pub use search::{rank, CancelFlag, QueryEngine, RankedDocument};
pub use stores::{FsDocumentStore, MemoryDocumentStore};
pub use tokenizer::{Token, Tokenizer};
pub use traits::{DocumentStore, TextExtractor};
