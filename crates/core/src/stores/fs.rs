use crate::error::StoreError;
use crate::models::{Document, DocumentId};
use crate::traits::DocumentStore;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

const MANIFEST_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub struct Manifest {
    pub document_count: usize,
    pub flushed_at: String,
    pub version: u32,
}

/// Directory-backed store.
///
/// Layout under the root: `documents/<id>.json` for records, `raw/<id>.bin`
/// for uploaded bytes, and `manifest.json` written on flush. Every file is
/// written to a sibling temp file and renamed into place.
pub struct FsDocumentStore {
    root: PathBuf,
}

impl FsDocumentStore {
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self { root: root.into() };
        fs::create_dir_all(store.documents_dir()).await?;
        fs::create_dir_all(store.raw_dir()).await?;
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn manifest(&self) -> Result<Option<Manifest>, StoreError> {
        match fs::read(self.manifest_path()).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    fn documents_dir(&self) -> PathBuf {
        self.root.join("documents")
    }

    fn raw_dir(&self) -> PathBuf {
        self.root.join("raw")
    }

    fn manifest_path(&self) -> PathBuf {
        self.root.join("manifest.json")
    }

    fn record_path(&self, id: &DocumentId) -> PathBuf {
        self.documents_dir().join(format!("{id}.json"))
    }

    fn raw_path(&self, id: &DocumentId) -> PathBuf {
        self.raw_dir().join(format!("{id}.bin"))
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    async fn put(&self, document: &Document, raw: Option<&[u8]>) -> Result<(), StoreError> {
        if let Some(bytes) = raw {
            write_atomic(&self.raw_path(&document.id), bytes).await?;
        }
        let record = serde_json::to_vec_pretty(document)?;
        write_atomic(&self.record_path(&document.id), &record).await
    }

    async fn get(&self, id: &DocumentId) -> Result<Option<Document>, StoreError> {
        match fs::read(self.record_path(id)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    async fn raw(&self, id: &DocumentId) -> Result<Option<Vec<u8>>, StoreError> {
        match fs::read(self.raw_path(id)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    async fn list(&self) -> Result<Vec<Document>, StoreError> {
        let mut entries = fs::read_dir(self.documents_dir()).await?;
        let mut documents = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_record = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext == "json");
            if !is_record {
                continue;
            }
            let bytes = fs::read(&path).await?;
            documents.push(serde_json::from_slice::<Document>(&bytes)?);
        }

        documents.sort_by(|left, right| left.id.cmp(&right.id));
        Ok(documents)
    }

    async fn delete(&self, id: &DocumentId) -> Result<bool, StoreError> {
        let existed = remove_if_present(&self.record_path(id)).await?;
        remove_if_present(&self.raw_path(id)).await?;
        Ok(existed)
    }

    async fn flush(&self) -> Result<(), StoreError> {
        let manifest = Manifest {
            document_count: self.list().await?.len(),
            flushed_at: Utc::now().to_rfc3339(),
            version: MANIFEST_VERSION,
        };
        let bytes = serde_json::to_vec_pretty(&manifest)?;
        write_atomic(&self.manifest_path(), &bytes).await
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let staging = path.with_extension("tmp");
    fs::write(&staging, bytes).await?;
    fs::rename(&staging, path).await?;
    Ok(())
}

async fn remove_if_present(path: &Path) -> Result<bool, StoreError> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(error) if error.kind() == ErrorKind::NotFound => Ok(false),
        Err(error) => Err(error.into()),
    }
}
