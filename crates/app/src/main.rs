use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use docsearch_app::build_app;
use docsearch_core::{
    discover_documents, DocumentId, EngineConfig, FsDocumentStore, IngestionOptions,
    ScoringConfig, SearchEngine, TokenizerConfig, DEFAULT_MAX_DOCUMENT_BYTES,
};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "docsearch", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory holding document records and uploaded bytes
    #[arg(long, env = "DOCSEARCH_DATA_DIR", default_value = "./docsearch-data")]
    data_dir: PathBuf,

    /// Largest accepted upload in bytes
    #[arg(long, env = "DOCSEARCH_MAX_DOCUMENT_BYTES", default_value_t = DEFAULT_MAX_DOCUMENT_BYTES)]
    max_document_bytes: usize,

    /// Deadline for one ingestion or query, in seconds
    #[arg(long, env = "DOCSEARCH_REQUEST_TIMEOUT_SECS", default_value = "30")]
    request_timeout_secs: u64,

    /// Apply English stemming to indexed and queried terms
    #[arg(long, env = "DOCSEARCH_STEMMING", default_value_t = false)]
    stemming: bool,

    /// Drop common English stopwords from documents and queries
    #[arg(long, env = "DOCSEARCH_STOPWORDS", default_value_t = false)]
    stopwords: bool,

    /// Let phrases match across PDF page boundaries
    #[arg(long, env = "DOCSEARCH_PHRASE_ACROSS_PAGES", default_value_t = false)]
    phrase_across_pages: bool,

    /// Score added for each satisfied phrase
    #[arg(long, env = "DOCSEARCH_PHRASE_BONUS", default_value = "10.0")]
    phrase_bonus: f64,

    /// Words of context on each side of an excerpt
    #[arg(long, env = "DOCSEARCH_EXCERPT_RADIUS", default_value = "8")]
    excerpt_radius: usize,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API.
    Serve {
        #[arg(long, env = "DOCSEARCH_HOST", default_value = "127.0.0.1")]
        host: String,
        #[arg(long, env = "DOCSEARCH_PORT", default_value = "8080")]
        port: u16,
        /// Allowed CORS origins, comma separated. Empty allows any origin.
        #[arg(long, env = "DOCSEARCH_CORS_ALLOW_ORIGIN", value_delimiter = ',')]
        cors_origin: Vec<String>,
    },
    /// Ingest one PDF/TXT file or every PDF/TXT file under a folder.
    Ingest {
        #[arg(long)]
        path: PathBuf,
    },
    /// Run a query and print ranked excerpts.
    Search {
        #[arg(long)]
        query: String,
        #[arg(long, default_value = "10")]
        limit: usize,
    },
    /// List every stored document.
    List,
    /// Remove a document and its postings.
    Remove {
        #[arg(long)]
        id: String,
    },
}

impl Cli {
    fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            ingestion: IngestionOptions {
                max_document_bytes: self.max_document_bytes,
                request_timeout: Duration::from_secs(self.request_timeout_secs),
            },
            tokenizer: TokenizerConfig {
                stemming: self.stemming,
                stopwords: self.stopwords,
                phrase_across_pages: self.phrase_across_pages,
            },
            scoring: ScoringConfig {
                phrase_bonus: self.phrase_bonus,
                excerpt_radius: self.excerpt_radius,
                ..ScoringConfig::default()
            },
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let store = FsDocumentStore::open(&cli.data_dir)
        .await
        .with_context(|| format!("opening data dir {}", cli.data_dir.display()))?;
    let engine = Arc::new(SearchEngine::open(Arc::new(store), cli.engine_config()).await?);
    info!(
        version = app_version,
        data_dir = %cli.data_dir.display(),
        started_at = %Utc::now().to_rfc3339(),
        "docsearch boot"
    );

    match cli.command {
        Command::Serve {
            host,
            port,
            cors_origin,
        } => {
            let app = build_app(Arc::clone(&engine), &cors_origin);
            let addr: SocketAddr = format!("{host}:{port}").parse()?;
            let listener = TcpListener::bind(addr).await?;
            info!(%addr, "server listening");
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
            engine.flush().await?;
        }
        Command::Ingest { path } => {
            let files = collect_files(&path);
            if files.is_empty() {
                println!("0 documents ingested (no PDF or TXT files under {})", path.display());
                return Ok(());
            }

            let mut indexed = 0usize;
            let mut failed = 0usize;
            for (filename, file) in files {
                let bytes = tokio::fs::read(&file)
                    .await
                    .with_context(|| format!("reading {}", file.display()))?;
                match engine.ingest_file(&filename, bytes).await {
                    Ok(document) => {
                        indexed += 1;
                        println!("indexed {} document_id={}", filename, document.id);
                    }
                    Err(error) if error.is_client_error() => {
                        failed += 1;
                        warn!(filename = %filename, kind = error.kind(), error = %error, "skipped document");
                    }
                    Err(error) => return Err(error.into()),
                }
            }
            engine.flush().await?;

            println!(
                "{indexed} documents ingested, {failed} skipped at {}",
                Utc::now().to_rfc3339()
            );
        }
        Command::Search { query, limit } => {
            let results = engine.search(&query, limit).await?;

            println!("query: {query}");
            if results.is_empty() {
                println!("no matches");
            }
            for (rank, result) in results.iter().enumerate() {
                println!(
                    "[{}] score={:.4} {} document_id={}",
                    rank + 1,
                    result.score,
                    result.filename,
                    result.document_id
                );
                println!("  {}", result.excerpt);
            }
        }
        Command::List => {
            for summary in engine.documents().await? {
                println!(
                    "{} {:<8} {:<4} {:>10}B {} {}",
                    summary.document_id,
                    format!("{:?}", summary.status).to_lowercase(),
                    summary.kind.as_str(),
                    summary.byte_len,
                    summary.ingested_at.to_rfc3339(),
                    summary.filename
                );
            }
        }
        Command::Remove { id } => {
            let id = DocumentId::new(id);
            if engine.remove(&id).await? {
                engine.flush().await?;
                println!("removed {id}");
            } else {
                anyhow::bail!("document {id} does not exist");
            }
        }
    }

    Ok(())
}

/// Pairs each file with the name it is stored under: the file name for a
/// single file, the path relative to the folder otherwise.
fn collect_files(path: &Path) -> Vec<(String, PathBuf)> {
    if path.is_dir() {
        discover_documents(path)
            .into_iter()
            .map(|file| {
                let name = file
                    .strip_prefix(path)
                    .unwrap_or(&file)
                    .to_string_lossy()
                    .into_owned();
                (name, file)
            })
            .collect()
    } else {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        vec![(name, path.to_path_buf())]
    }
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "failed to listen for shutdown signal");
    }
    info!("shutting down");
}
