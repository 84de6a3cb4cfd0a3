use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use docsearch_app::build_app;
use docsearch_core::{EngineConfig, IngestionOptions, MemoryDocumentStore, SearchEngine};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

const BOUNDARY: &str = "docsearch-test-boundary";

async fn app_with(config: EngineConfig) -> Router {
    let engine = SearchEngine::open(Arc::new(MemoryDocumentStore::new()), config)
        .await
        .unwrap();
    build_app(Arc::new(engine), &[])
}

async fn app() -> Router {
    app_with(EngineConfig::default()).await
}

fn multipart(files: &[(&str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (filename, contents) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(contents.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload_request(files: &[(&str, &str)]) -> Request<Body> {
    Request::post("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart(files)))
        .unwrap()
}

async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    call(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

#[tokio::test]
async fn upload_then_search_phrase() {
    let app = app().await;
    let (status, json) = call(
        &app,
        upload_request(&[
            ("doc1.txt", "the quick brown fox"),
            ("other.txt", "a brown dog and a quick cat"),
        ]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let documents = json["documents"].as_array().unwrap();
    assert_eq!(documents.len(), 2);
    assert_eq!(documents[0]["filename"], "doc1.txt");
    assert_eq!(documents[0]["status"], "indexed");

    let (status, json) = get(&app, "/search?q=%22quick%20brown%22").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["query"], "\"quick brown\"");
    assert_eq!(json["total"], 1);
    let results = json["results"].as_array().unwrap();
    assert_eq!(results[0]["filename"], "doc1.txt");
    assert!(results[0]["excerpt"]
        .as_str()
        .unwrap()
        .contains("<mark>quick brown</mark>"));
}

#[tokio::test]
async fn search_respects_limit() {
    let app = app().await;
    call(
        &app,
        upload_request(&[("a.txt", "shared"), ("b.txt", "shared"), ("c.txt", "shared")]),
    )
    .await;

    let (status, json) = get(&app, "/search?q=shared&limit=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["results"].as_array().unwrap().len(), 2);
    assert_eq!(json["total"], 3);
}

#[tokio::test]
async fn search_without_query_is_json_bad_request() {
    let app = app().await;
    for uri in ["/search", "/search?limit=2", "/search?q=fox&limit=many"] {
        let (status, json) = get(&app, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(json["kind"], "invalid_argument", "{uri}");
        assert!(!json["error"].as_str().unwrap().is_empty());
    }
}

#[tokio::test]
async fn unterminated_quote_is_bad_request() {
    let app = app().await;
    let (status, json) = get(&app, "/search?q=%22quick").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "query_syntax_error");
}

#[tokio::test]
async fn upload_errors_map_to_statuses() {
    let app = app().await;

    let (status, json) = call(&app, upload_request(&[("image.png", "PNG")])).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(json["kind"], "unsupported_format");

    let (status, json) = call(&app, upload_request(&[("broken.pdf", "not a pdf")])).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["kind"], "corrupt_document");

    let (_, library) = get(&app, "/documents").await;
    let rows = library.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["filename"], "broken.pdf");
    assert_eq!(rows[0]["status"], "failed");
}

#[tokio::test]
async fn oversized_upload_is_rejected() {
    let app = app_with(EngineConfig {
        ingestion: IngestionOptions {
            max_document_bytes: 8,
            ..IngestionOptions::default()
        },
        ..EngineConfig::default()
    })
    .await;

    let (status, json) = call(&app, upload_request(&[("big.txt", "far more than eight bytes")])).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json["kind"], "document_too_large");

    let (_, library) = get(&app, "/documents").await;
    assert!(library.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn document_detail_and_delete() {
    let app = app().await;
    let (_, json) = call(&app, upload_request(&[("notes.txt", "remember the milk")])).await;
    let id = json["documents"][0]["document_id"].as_str().unwrap().to_string();

    let (status, detail) = get(&app, &format!("/documents/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["text"], "remember the milk");
    assert_eq!(detail["kind"], "text");

    let delete = Request::delete(format!("/documents/{id}")).body(Body::empty()).unwrap();
    let (status, _) = call(&app, delete).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, json) = get(&app, &format!("/documents/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["kind"], "not_found");

    let (_, json) = get(&app, "/search?q=milk").await;
    assert_eq!(json["total"], 0);
}

#[tokio::test]
async fn reset_clears_library() {
    let app = app().await;
    call(&app, upload_request(&[("a.txt", "alpha"), ("b.txt", "beta")])).await;

    let reset = Request::post("/reset").body(Body::empty()).unwrap();
    let (status, json) = call(&app, reset).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["removed"], 2);

    let (status, json) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["documents"], 0);
}

#[tokio::test]
async fn upload_without_files_is_bad_request() {
    let app = app().await;
    let (status, json) = call(&app, upload_request(&[])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "invalid_argument");
}
