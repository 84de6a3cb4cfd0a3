use crate::error::IngestError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;

const DOCUMENT_ID_HEX_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Uploads are keyed by filename, so re-uploading a file lands on the same id.
    pub fn from_filename(filename: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(filename.as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        Self(digest[..DOCUMENT_ID_HEX_LEN].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MimeKind {
    Pdf,
    Text,
}

impl MimeKind {
    pub fn from_filename(filename: &str) -> Result<Self, IngestError> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        match extension.as_deref() {
            Some("pdf") => Ok(Self::Pdf),
            Some("txt") => Ok(Self::Text),
            Some(other) => Err(IngestError::UnsupportedFormat(format!(
                "extension .{other} is not supported: {filename}"
            ))),
            None => Err(IngestError::UnsupportedFormat(format!(
                "file has no extension: {filename}"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Text => "txt",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Indexed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: DocumentId,
    pub filename: String,
    pub kind: MimeKind,
    pub byte_len: usize,
    pub checksum: String,
    #[serde(default)]
    pub text: String,
    pub ingested_at: DateTime<Utc>,
    pub status: DocumentStatus,
    #[serde(default)]
    pub failure: Option<String>,
}

impl Document {
    pub fn pending(filename: &str, kind: MimeKind, bytes: &[u8]) -> Self {
        Self {
            id: DocumentId::from_filename(filename),
            filename: filename.to_string(),
            kind,
            byte_len: bytes.len(),
            checksum: digest_bytes(bytes),
            text: String::new(),
            ingested_at: Utc::now(),
            status: DocumentStatus::Pending,
            failure: None,
        }
    }

    pub fn summary(&self) -> DocumentSummary {
        DocumentSummary {
            document_id: self.id.clone(),
            filename: self.filename.clone(),
            kind: self.kind,
            status: self.status,
            byte_len: self.byte_len,
            ingested_at: self.ingested_at,
        }
    }
}

/// Library view of a document, without its extracted text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentSummary {
    pub document_id: DocumentId,
    pub filename: String,
    pub kind: MimeKind,
    pub status: DocumentStatus,
    pub byte_len: usize,
    pub ingested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredResult {
    pub document_id: DocumentId,
    pub filename: String,
    pub score: f64,
    pub excerpt: String,
}

/// One page of ranked results.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SearchPage {
    /// Documents in the index matching the query, before truncation.
    pub total: usize,
    pub results: Vec<ScoredResult>,
}

pub fn digest_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
