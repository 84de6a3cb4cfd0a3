use crate::models::DocumentId;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IndexError {
    #[error("document {0} already has postings")]
    DuplicateDocument(DocumentId),
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("corrupt document: {0}")]
    CorruptDocument(String),

    #[error("document is {size} bytes, limit is {limit}")]
    DocumentTooLarge { size: usize, limit: usize },

    #[error("ingestion exceeded {0:?}")]
    Timeout(Duration),

    #[error("storage failure: {0}")]
    StorageFailure(#[from] StoreError),

    #[error("index rejected document: {0}")]
    Index(#[from] IndexError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl IngestError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnsupportedFormat(_) => "unsupported_format",
            Self::CorruptDocument(_) => "corrupt_document",
            Self::DocumentTooLarge { .. } => "document_too_large",
            Self::Timeout(_) => "timeout",
            Self::StorageFailure(_) | Self::Index(_) => "storage_failure",
            Self::InvalidArgument(_) => "invalid_argument",
        }
    }

    /// True when the caller sent something the engine will never accept.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedFormat(_)
                | Self::CorruptDocument(_)
                | Self::DocumentTooLarge { .. }
                | Self::InvalidArgument(_)
        )
    }
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("query syntax error at byte {position}: {message}")]
    QuerySyntax { position: usize, message: String },

    #[error("search was cancelled")]
    Cancelled,

    #[error("search exceeded its deadline")]
    TimedOut,

    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
}

impl SearchError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::QuerySyntax { .. } => "query_syntax_error",
            Self::Cancelled => "cancelled",
            Self::TimedOut => "timeout",
            Self::Storage(_) => "storage_failure",
        }
    }
}
