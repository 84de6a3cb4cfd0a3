use axum::extract::multipart::MultipartError;
use axum::extract::rejection::QueryRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use docsearch_core::{
    Document, DocumentId, DocumentStatus, DocumentSummary, IngestError, ScoredResult,
    SearchEngine, SearchError, StoreError,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Headroom on top of the per-document limit for multipart framing.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    10
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_ms: u128,
    /// Matching documents, which may exceed `results.len()`.
    pub total: usize,
    pub results: Vec<ScoredResult>,
}

#[derive(Serialize)]
pub struct UploadedDocument {
    pub document_id: DocumentId,
    pub filename: String,
    pub status: DocumentStatus,
}

#[derive(Serialize)]
pub struct UploadResponse {
    pub documents: Vec<UploadedDocument>,
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: &'static str,
}

/// Error response carrying the status and the machine-readable kind.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
        }
    }

    fn not_found(id: &DocumentId) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("document {id} does not exist"),
        )
    }
}

impl From<IngestError> for ApiError {
    fn from(error: IngestError) -> Self {
        let status = match &error {
            IngestError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            IngestError::CorruptDocument(_) => StatusCode::UNPROCESSABLE_ENTITY,
            IngestError::DocumentTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            IngestError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            IngestError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            IngestError::StorageFailure(_) | IngestError::Index(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, error.kind(), error.to_string())
    }
}

impl From<SearchError> for ApiError {
    fn from(error: SearchError) -> Self {
        let status = match &error {
            SearchError::QuerySyntax { .. } => StatusCode::BAD_REQUEST,
            SearchError::TimedOut => StatusCode::GATEWAY_TIMEOUT,
            SearchError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            SearchError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, error.kind(), error.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "storage_failure",
            error.to_string(),
        )
    }
}

impl From<MultipartError> for ApiError {
    fn from(error: MultipartError) -> Self {
        let status = error.status();
        let kind = if status == StatusCode::PAYLOAD_TOO_LARGE {
            "document_too_large"
        } else {
            "invalid_argument"
        };
        Self::new(status, kind, error.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "invalid_argument",
            rejection.body_text(),
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(kind = self.kind, error = %self.message, "request failed");
        }
        let body = ErrorBody {
            error: self.message,
            kind: self.kind,
        };
        (self.status, Json(body)).into_response()
    }
}

/// Builds the HTTP router over a shared engine.
///
/// An empty `allowed_origins` allows any origin.
pub fn build_app(engine: Arc<SearchEngine>, allowed_origins: &[String]) -> Router {
    let origins: Vec<_> = allowed_origins
        .iter()
        .filter_map(|origin| origin.trim().parse().ok())
        .collect();
    let cors = if origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };
    let body_limit = engine
        .config()
        .ingestion
        .max_document_bytes
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/health", get(health))
        .route("/upload", post(upload))
        .route("/search", get(search))
        .route("/documents", get(list_documents))
        .route("/documents/:id", get(get_document).delete(delete_document))
        .route("/reset", post(reset))
        .with_state(engine)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

async fn health(State(engine): State<Arc<SearchEngine>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "documents": engine.index().document_count(),
    }))
}

/// Ingests every `file` field in order; the first failure aborts the request.
async fn upload(
    State(engine): State<Arc<SearchEngine>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut documents = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| {
                ApiError::new(
                    StatusCode::BAD_REQUEST,
                    "invalid_argument",
                    "file field has no filename",
                )
            })?;
        let bytes = field.bytes().await?;
        let document = engine.ingest_file(&filename, bytes.to_vec()).await?;
        documents.push(UploadedDocument {
            document_id: document.id,
            filename: document.filename,
            status: document.status,
        });
    }

    if documents.is_empty() {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "invalid_argument",
            "request carried no file field",
        ));
    }
    info!(count = documents.len(), "upload accepted");
    Ok(Json(UploadResponse { documents }))
}

async fn search(
    State(engine): State<Arc<SearchEngine>>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
    let Query(params) = params?;
    let start = Instant::now();
    let page = engine.search_page(&params.q, params.limit).await?;
    Ok(Json(SearchResponse {
        query: params.q,
        took_ms: start.elapsed().as_millis(),
        total: page.total,
        results: page.results,
    }))
}

async fn list_documents(
    State(engine): State<Arc<SearchEngine>>,
) -> Result<Json<Vec<DocumentSummary>>, ApiError> {
    Ok(Json(engine.documents().await?))
}

async fn get_document(
    State(engine): State<Arc<SearchEngine>>,
    Path(id): Path<String>,
) -> Result<Json<Document>, ApiError> {
    let id = DocumentId::new(id);
    match engine.document(&id).await? {
        Some(document) => Ok(Json(document)),
        None => Err(ApiError::not_found(&id)),
    }
}

async fn delete_document(
    State(engine): State<Arc<SearchEngine>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = DocumentId::new(id);
    if engine.remove(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(&id))
    }
}

async fn reset(
    State(engine): State<Arc<SearchEngine>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let removed = engine.reset().await?;
    Ok(Json(serde_json::json!({ "removed": removed })))
}
