use std::time::Duration;

pub const DEFAULT_MAX_DOCUMENT_BYTES: usize = 32 * 1024 * 1024;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Default)]
pub struct TokenizerConfig {
    /// Reduce terms to their English stem.
    pub stemming: bool,
    /// Drop common English stopwords from documents and queries.
    pub stopwords: bool,
    /// Let phrases match across a page boundary.
    pub phrase_across_pages: bool,
}

#[derive(Debug, Clone)]
pub struct ScoringConfig {
    pub phrase_bonus: f64,
    pub excerpt_radius: usize,
    pub highlight_open: String,
    pub highlight_close: String,
    pub max_top_k: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            phrase_bonus: 10.0,
            excerpt_radius: 8,
            highlight_open: "<mark>".to_string(),
            highlight_close: "</mark>".to_string(),
            max_top_k: 100,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IngestionOptions {
    pub max_document_bytes: usize,
    pub request_timeout: Duration,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub ingestion: IngestionOptions,
    pub tokenizer: TokenizerConfig,
    pub scoring: ScoringConfig,
}
