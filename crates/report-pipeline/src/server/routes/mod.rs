//! API routes for the pipeline server

pub mod chunks;
pub mod discovery;
pub mod index;
pub mod pipeline;

use axum::{
    routing::{get, post},
    Router,
};

use crate::server::state::AppState;

/// Build all `/api` routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Discovery
        .route("/years", get(discovery::list_years))
        .route("/years/:year/quarters", get(discovery::list_quarters))
        .route("/reports/:year/:quarter/pdf-url", get(discovery::pdf_url))
        .route("/options", get(discovery::options))
        // Stage triggers
        .route("/pipeline/trigger", post(pipeline::trigger))
        .route("/convert/:parser", post(pipeline::convert))
        .route("/chunks", post(chunks::create_chunks))
        .route("/index/:backend/upload", post(index::upload))
        .route("/index/:backend/query", post(index::query))
        .route("/index/:backend/summarize", post(index::summarize))
        // Info
        .route("/info", get(info))
}

/// Routes serving presigned object links of the local store
pub fn object_routes() -> Router<AppState> {
    Router::new().route("/objects/*key", get(discovery::presigned_object))
}

/// API info endpoint
async fn info() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "name": "report-pipeline",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Quarterly report pipeline: PDF conversion, chunking, indexing and grounded answers",
        "endpoints": {
            "GET /api/years": "Years with raw report PDFs, newest first",
            "GET /api/years/:year/quarters": "Quarters available for a year",
            "GET /api/reports/:year/:quarter/pdf-url": "Presigned link to the raw PDF",
            "GET /api/options": "Available parsers, chunking strategies and vector backends",
            "POST /api/pipeline/trigger": "Submit the layout-parser conversion job to the orchestrator",
            "POST /api/convert/:parser": "Convert a raw PDF to markdown in-process",
            "POST /api/chunks": "Split converted markdown into chunks",
            "POST /api/index/:backend/upload": "Embed and index a chunk set",
            "POST /api/index/:backend/query": "Grounded answer from an indexed chunk set",
            "POST /api/index/:backend/summarize": "Summary of an indexed report"
        }
    }))
}
