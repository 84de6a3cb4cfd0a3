use crate::config::IngestionOptions;
use crate::error::{IndexError, IngestError};
use crate::extractor::extract;
use crate::index::InvertedIndex;
use crate::models::{Document, DocumentId, DocumentStatus, MimeKind};
use crate::tokenizer::{Token, Tokenizer};
use crate::traits::DocumentStore;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub fn discover_documents(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let supported = entry
            .path()
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| MimeKind::from_filename(name).is_ok());

        if supported {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

type LockMap = Arc<Mutex<HashMap<DocumentId, Arc<AsyncMutex<()>>>>>;

/// One async mutex per document id; ingestion and removal of the same id never interleave.
///
/// An entry lives only while some task holds or waits for it.
#[derive(Clone, Default)]
pub struct DocumentLocks {
    locks: LockMap,
}

impl DocumentLocks {
    pub async fn acquire(&self, id: &DocumentId) -> DocumentGuard {
        let lock = Arc::clone(self.locks.lock().entry(id.clone()).or_default());
        DocumentGuard {
            guard: Some(lock.lock_owned().await),
            id: id.clone(),
            locks: Arc::clone(&self.locks),
        }
    }

    /// Ids currently held or waited on.
    pub fn tracked(&self) -> usize {
        self.locks.lock().len()
    }
}

/// Exclusive hold on one document id, released on drop.
pub struct DocumentGuard {
    guard: Option<OwnedMutexGuard<()>>,
    id: DocumentId,
    locks: LockMap,
}

impl Drop for DocumentGuard {
    fn drop(&mut self) {
        self.guard.take();
        let mut locks = self.locks.lock();
        // Waiters hold their own clone, so a count of one means the map's is the last.
        if locks
            .get(&self.id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.id);
        }
    }
}

pub struct IngestionPipeline {
    index: Arc<InvertedIndex>,
    tokenizer: Arc<Tokenizer>,
    store: Arc<dyn DocumentStore>,
    options: IngestionOptions,
    locks: DocumentLocks,
}

impl IngestionPipeline {
    pub fn new(
        index: Arc<InvertedIndex>,
        tokenizer: Arc<Tokenizer>,
        store: Arc<dyn DocumentStore>,
        options: IngestionOptions,
        locks: DocumentLocks,
    ) -> Self {
        Self {
            index,
            tokenizer,
            store,
            options,
            locks,
        }
    }

    /// Extracts, tokenizes and indexes one upload.
    ///
    /// The record is written as pending first. Any failure before the index
    /// update leaves it failed with no postings; a failure to persist the
    /// indexed record removes the postings that were just installed.
    pub async fn ingest(
        &self,
        filename: &str,
        bytes: Vec<u8>,
        kind: MimeKind,
    ) -> Result<Document, IngestError> {
        if filename.trim().is_empty() {
            return Err(IngestError::InvalidArgument("filename is empty".to_string()));
        }
        if bytes.len() > self.options.max_document_bytes {
            return Err(IngestError::DocumentTooLarge {
                size: bytes.len(),
                limit: self.options.max_document_bytes,
            });
        }

        let mut document = Document::pending(filename, kind, &bytes);
        let _guard = self.locks.acquire(&document.id).await;

        self.store.put(&document, Some(bytes.as_slice())).await?;
        info!(
            document_id = %document.id,
            filename,
            kind = kind.as_str(),
            bytes = document.byte_len,
            "document accepted"
        );

        let (text, tokens) = match self.extract_and_tokenize(bytes, kind).await {
            Ok(prepared) => prepared,
            Err(error) => {
                self.mark_failed(&mut document, &error).await;
                return Err(error);
            }
        };

        if let Err(error) = self.install(&document.id, &tokens) {
            self.mark_failed(&mut document, &error).await;
            return Err(error);
        }

        document.status = DocumentStatus::Indexed;
        document.text = text;
        if let Err(store_error) = self.store.put(&document, None).await {
            self.index.remove_document(&document.id);
            let error = IngestError::StorageFailure(store_error);
            self.mark_failed(&mut document, &error).await;
            return Err(error);
        }

        info!(
            document_id = %document.id,
            filename,
            tokens = tokens.len(),
            "document indexed"
        );
        Ok(document)
    }

    async fn extract_and_tokenize(
        &self,
        bytes: Vec<u8>,
        kind: MimeKind,
    ) -> Result<(String, Vec<Token>), IngestError> {
        let tokenizer = Arc::clone(&self.tokenizer);
        let work = tokio::task::spawn_blocking(move || {
            let text = extract(&bytes, kind)?;
            let tokens = tokenizer.tokenize(&text);
            Ok::<_, IngestError>((text, tokens))
        });

        match tokio::time::timeout(self.options.request_timeout, work).await {
            Ok(Ok(prepared)) => prepared,
            Ok(Err(join_error)) => Err(IngestError::CorruptDocument(format!(
                "extraction aborted: {join_error}"
            ))),
            Err(_) => Err(IngestError::Timeout(self.options.request_timeout)),
        }
    }

    fn install(&self, id: &DocumentId, tokens: &[Token]) -> Result<(), IngestError> {
        match self.index.add_document(id, tokens) {
            Ok(()) => Ok(()),
            Err(IndexError::DuplicateDocument(_)) => {
                debug!(document_id = %id, "replacing previous postings");
                self.index.remove_document(id);
                self.index.add_document(id, tokens).map_err(IngestError::from)
            }
        }
    }

    async fn mark_failed(&self, document: &mut Document, error: &IngestError) {
        self.index.remove_document(&document.id);
        document.status = DocumentStatus::Failed;
        document.failure = Some(error.to_string());
        document.text.clear();

        warn!(
            document_id = %document.id,
            filename = %document.filename,
            kind = error.kind(),
            reason = %error,
            "ingestion failed"
        );

        if let Err(store_error) = self.store.put(document, None).await {
            warn!(document_id = %document.id, error = %store_error, "could not record failure");
        }
    }
}
