//! Chunking endpoint

use axum::{extract::State, Json};

use crate::error::Result;
use crate::server::extract::ApiJson;
use crate::server::state::AppState;
use crate::types::api::{ChunkSetRequest, ChunksResponse};

/// POST /api/chunks - split converted markdown with the selected strategy
pub async fn create_chunks(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ChunkSetRequest>,
) -> Result<Json<ChunksResponse>> {
    let key = state.resolve_chunk_set(&request)?;
    let chunks = state
        .chunker()
        .chunk_set(state.store().as_ref(), &key)
        .await?;

    Ok(Json(ChunksResponse {
        chunks: chunks.into_iter().map(|c| c.text).collect(),
    }))
}
