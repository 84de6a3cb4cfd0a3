use crate::error::{IngestError, StoreError};
use crate::models::{Document, DocumentId};
use async_trait::async_trait;

/// Converts the raw bytes of one document kind into plain text.
pub trait TextExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String, IngestError>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Writes the record. Raw bytes are replaced only when `raw` is given.
    async fn put(&self, document: &Document, raw: Option<&[u8]>) -> Result<(), StoreError>;

    async fn get(&self, id: &DocumentId) -> Result<Option<Document>, StoreError>;

    async fn raw(&self, id: &DocumentId) -> Result<Option<Vec<u8>>, StoreError>;

    async fn list(&self) -> Result<Vec<Document>, StoreError>;

    /// Returns whether a record existed.
    async fn delete(&self, id: &DocumentId) -> Result<bool, StoreError>;

    async fn flush(&self) -> Result<(), StoreError>;
}
