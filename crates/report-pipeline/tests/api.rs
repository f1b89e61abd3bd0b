//! End-to-end tests of the HTTP API against a scratch object store

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use report_pipeline::conversion::build_converters;
use report_pipeline::index::build_backends;
use report_pipeline::providers::{HashingEmbedder, LlmProvider};
use report_pipeline::server::build_router;
use report_pipeline::server::state::{AppState, StateParts};
use report_pipeline::storage::{LocalObjectStore, ObjectStore};
use report_pipeline::workflow::{PipelineRun, WorkflowTrigger};
use report_pipeline::{PipelineConfig, Result};

const PUBLIC_URL: &str = "http://reports.test";

const REPORT_MD: &str = "# Results\n\nRevenue grew 12% to $4.2 billion.\n\n\
## Outlook\n\nGuidance for next quarter is unchanged.\n\n\
## Risks\n\nSupply constraints may persist.\n";

struct FixedRun;

#[async_trait]
impl WorkflowTrigger for FixedRun {
    async fn trigger(&self, job: &str, params: &BTreeMap<String, String>) -> Result<PipelineRun> {
        Ok(PipelineRun::submitted("abc123".to_string(), job, params))
    }

    fn conversion_job(&self) -> &str {
        "dag_pdf_parser_docling"
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

struct EchoLlm;

#[async_trait]
impl LlmProvider for EchoLlm {
    async fn answer(&self, question: &str, context: &str) -> Result<String> {
        Ok(format!("{} ({} context chars)", question, context.len()))
    }

    async fn summarize(&self, context: &str) -> Result<String> {
        Ok(format!("summary of {} chars", context.len()))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "echo"
    }

    fn model(&self) -> &str {
        "echo"
    }
}

struct TestApp {
    router: Router,
    store: Arc<LocalObjectStore>,
    _dir: TempDir,
}

impl TestApp {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = PipelineConfig::default();
        config.storage.root = dir.path().to_path_buf();
        config.server.public_url = PUBLIC_URL.to_string();

        let store = Arc::new(
            LocalObjectStore::new(dir.path().to_path_buf(), PUBLIC_URL, b"test-secret").unwrap(),
        );
        let parts = StateParts {
            store: store.clone(),
            workflow: Arc::new(FixedRun),
            embedder: Arc::new(HashingEmbedder::new(64)),
            llm: Arc::new(EchoLlm),
            converters: build_converters(&config.conversion).unwrap(),
            backends: build_backends(&config.vector_stores).unwrap(),
        };
        let state = AppState::from_parts(config, parts);

        Self {
            router: build_router(state, false),
            store,
            _dir: dir,
        }
    }

    async fn put(&self, key: &str, data: &[u8]) {
        self.store.put(data.to_vec(), key).await.unwrap();
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let (status, body) = self.send(request).await;
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let (status, body) = self.send(request).await;
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }
}

fn chunk_set(strategy: &str) -> Value {
    json!({"year": "2024", "quarter": "Q1", "parser": "layout", "strategy": strategy})
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"OK");
}

#[tokio::test]
async fn test_years_newest_first() {
    let app = TestApp::new();
    app.put("Raw_PDFs/2023/Q4.pdf", b"%PDF-2023").await;
    app.put("Raw_PDFs/2024/Q1.pdf", b"%PDF-2024").await;

    let (status, body) = app.get("/api/years").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"years": ["2024", "2023"]}));

    // Discovery is idempotent
    let (_, again) = app.get("/api/years").await;
    assert_eq!(again, body);
}

#[tokio::test]
async fn test_quarters_sorted() {
    let app = TestApp::new();
    app.put("Raw_PDFs/2024/Q2.pdf", b"%PDF-q2").await;
    app.put("Raw_PDFs/2024/Q1.pdf", b"%PDF-q1").await;

    let (status, body) = app.get("/api/years/2024/quarters").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"quarters": ["Q1", "Q2"]}));

    let (status, body) = app.get("/api/years/20x4/quarters").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("Invalid year"));
}

#[tokio::test]
async fn test_pdf_url_missing_is_not_found() {
    let app = TestApp::new();
    let (status, body) = app.get("/api/reports/2024/Q3/pdf-url").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"detail": "PDF not found"}));
}

#[tokio::test]
async fn test_presigned_pdf_download() {
    let app = TestApp::new();
    app.put("Raw_PDFs/2024/Q1.pdf", b"%PDF-1.7 report").await;

    let (status, body) = app.get("/api/reports/2024/Q1/pdf-url").await;
    assert_eq!(status, StatusCode::OK);
    let url = body["pdf_url"].as_str().unwrap();
    let path = url.strip_prefix(PUBLIC_URL).unwrap();
    assert!(path.starts_with("/objects/Raw_PDFs/2024/Q1.pdf?"));

    let request = Request::builder().uri(path).body(Body::empty()).unwrap();
    let (status, bytes) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"%PDF-1.7 report");

    let (base, _) = path.split_once("&signature=").unwrap();
    let forged = format!("{}&signature=deadbeef", base);
    let request = Request::builder().uri(forged).body(Body::empty()).unwrap();
    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_trigger_returns_run_id() {
    let app = TestApp::new();
    app.put("Raw_PDFs/2024/Q1.pdf", b"%PDF").await;

    let (status, body) = app
        .post("/api/pipeline/trigger", json!({"year": "2024", "quarter": "Q1"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["run_id"], "abc123");
    assert_eq!(body["message"], "DAG triggered successfully");

    let (status, _) = app
        .post("/api/pipeline/trigger", json!({"year": "2024", "quarter": "Q2"}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_parser_is_rejected() {
    let app = TestApp::new();
    let (status, body) = app
        .post("/api/convert/docx", json!({"year": "2024", "quarter": "Q1"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("Unknown parser"));
}

#[tokio::test]
async fn test_chunks_before_conversion_is_not_found() {
    let app = TestApp::new();
    let (status, body) = app.post("/api/chunks", chunk_set("markdown")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["detail"].as_str().unwrap().contains("Markdown not found"));
}

#[tokio::test]
async fn test_chunks_are_deterministic() {
    let app = TestApp::new();
    app.put("docling_markdown/2024/Q1/Q1.md", REPORT_MD.as_bytes()).await;

    let (status, first) = app.post("/api/chunks", chunk_set("markdown")).await;
    assert_eq!(status, StatusCode::OK);
    let chunks = first["chunks"].as_array().unwrap();
    assert_eq!(chunks.len(), 3);
    assert!(chunks[0].as_str().unwrap().starts_with("# Results"));
    assert!(chunks[2].as_str().unwrap().starts_with("## Risks"));

    let (_, second) = app.post("/api/chunks", chunk_set("markdown")).await;
    assert_eq!(first, second);

    let (status, _) = app.post("/api/chunks", chunk_set("recursive")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_manual_upload_query_and_summary() {
    let app = TestApp::new();
    app.put("docling_markdown/2024/Q1/Q1.md", REPORT_MD.as_bytes()).await;

    // Nothing indexed yet
    let mut query = chunk_set("markdown");
    query["query"] = json!("How much did revenue grow?");
    let (status, _) = app.post("/api/index/manual/query", query.clone()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .post("/api/index/manual/upload", chunk_set("markdown"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["chunks_uploaded"], 3);

    // Re-upload replaces instead of duplicating
    let (_, body) = app
        .post("/api/index/manual/upload", chunk_set("markdown"))
        .await;
    assert_eq!(body["chunks_uploaded"], 3);

    query["top_k"] = json!(5);
    let (status, body) = app.post("/api/index/manual/query", query).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["answer"]
        .as_str()
        .unwrap()
        .starts_with("How much did revenue grow?"));
    assert_eq!(body["sources"].as_array().unwrap().len(), 3);

    let (status, body) = app
        .post("/api/index/manual/summarize", chunk_set("markdown"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["summary"].as_str().unwrap().starts_with("summary of"));
}

#[tokio::test]
async fn test_options_lists_registered_names() {
    let app = TestApp::new();
    let (status, body) = app.get("/api/options").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["strategies"], json!(["markdown", "semantic", "recursive"]));
    assert_eq!(body["backends"], json!(["manual"]));
    assert!(body["parsers"]
        .as_array()
        .unwrap()
        .contains(&json!("layout")));
    assert_eq!(body["orchestrated_parsers"], json!(["layout"]));
}

#[tokio::test]
async fn test_malformed_requests_get_detail_bodies() {
    let app = TestApp::new();

    let (status, body) = app
        .post(
            "/api/chunks",
            json!({"year": "2024", "quarter": "Q1", "parser": "layout"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("strategy"));

    // Body without a JSON content type
    let request = Request::builder()
        .method("POST")
        .uri("/api/pipeline/trigger")
        .body(Body::from(r#"{"year": "2024", "quarter": "Q1"}"#))
        .unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert!(body["detail"].as_str().unwrap().contains("Content-Type"));

    // Object link without expiry and signature
    let (status, body) = app.get("/objects/Raw_PDFs/2024/Q1.pdf").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].is_string());
}
