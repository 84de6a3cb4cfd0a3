use crate::error::StoreError;
use crate::models::{Document, DocumentId};
use crate::traits::DocumentStore;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

struct StoredDocument {
    document: Document,
    raw: Option<Vec<u8>>,
}

/// Process-local store; nothing survives a restart.
#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: RwLock<HashMap<DocumentId, StoredDocument>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn put(&self, document: &Document, raw: Option<&[u8]>) -> Result<(), StoreError> {
        let mut documents = self.documents.write();
        let raw = match raw {
            Some(bytes) => Some(bytes.to_vec()),
            None => documents
                .remove(&document.id)
                .and_then(|previous| previous.raw),
        };
        documents.insert(
            document.id.clone(),
            StoredDocument {
                document: document.clone(),
                raw,
            },
        );
        Ok(())
    }

    async fn get(&self, id: &DocumentId) -> Result<Option<Document>, StoreError> {
        Ok(self
            .documents
            .read()
            .get(id)
            .map(|stored| stored.document.clone()))
    }

    async fn raw(&self, id: &DocumentId) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self
            .documents
            .read()
            .get(id)
            .and_then(|stored| stored.raw.clone()))
    }

    async fn list(&self) -> Result<Vec<Document>, StoreError> {
        Ok(self
            .documents
            .read()
            .values()
            .map(|stored| stored.document.clone())
            .collect())
    }

    async fn delete(&self, id: &DocumentId) -> Result<bool, StoreError> {
        Ok(self.documents.write().remove(id).is_some())
    }

    async fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
