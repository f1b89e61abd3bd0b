//! Indexing, query and summary endpoints

use axum::{
    extract::State,
    Json,
};

use crate::error::Result;
use crate::server::extract::{ApiJson, ApiPath};
use crate::server::state::AppState;
use crate::types::api::{
    ChunkSetRequest, QueryRequest, QueryResponse, SummaryResponse, UploadResponse,
};

/// POST /api/index/:backend/upload - chunk, embed and index a chunk set
pub async fn upload(
    State(state): State<AppState>,
    ApiPath(backend): ApiPath<String>,
    ApiJson(request): ApiJson<ChunkSetRequest>,
) -> Result<Json<UploadResponse>> {
    let backend = state.backends().get(&backend)?;
    let key = state.resolve_chunk_set(&request)?;

    let chunks = state
        .chunker()
        .chunk_set(state.store().as_ref(), &key)
        .await?;
    let chunks_uploaded = state
        .retrieval()
        .upload(backend.as_ref(), &key, chunks)
        .await?;

    Ok(Json(UploadResponse { chunks_uploaded }))
}

/// POST /api/index/:backend/query - grounded answer plus supporting chunks
pub async fn query(
    State(state): State<AppState>,
    ApiPath(backend): ApiPath<String>,
    ApiJson(request): ApiJson<QueryRequest>,
) -> Result<Json<QueryResponse>> {
    let backend = state.backends().get(&backend)?;
    let key = state.resolve_chunk_set(&request.chunk_set())?;

    tracing::info!("Query on {} via {}: \"{}\"", key, backend.name(), request.query);
    let outcome = state
        .retrieval()
        .query(backend.as_ref(), &key, &request.query, request.top_k)
        .await?;

    Ok(Json(QueryResponse {
        answer: outcome.answer,
        sources: outcome.sources.into_iter().map(|s| s.chunk.text).collect(),
    }))
}

/// POST /api/index/:backend/summarize - summary of an indexed report
pub async fn summarize(
    State(state): State<AppState>,
    ApiPath(backend): ApiPath<String>,
    ApiJson(request): ApiJson<ChunkSetRequest>,
) -> Result<Json<SummaryResponse>> {
    let backend = state.backends().get(&backend)?;
    let key = state.resolve_chunk_set(&request)?;

    let summary = state.retrieval().summarize(backend.as_ref(), &key).await?;
    Ok(Json(SummaryResponse { summary }))
}
