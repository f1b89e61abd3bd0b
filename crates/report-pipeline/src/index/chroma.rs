//! ChromaDB REST backend
//!
//! All chunk sets share one collection (cosine space). Entries carry their
//! chunk set slug in metadata, which scopes deletes and queries.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::OnceCell;

use super::VectorBackend;
use crate::config::ChromaConfig;
use crate::error::{Error, Result};
use crate::types::{Chunk, ChunkSetKey, EmbeddedChunk, ScoredChunk};

const SERVICE: &str = "ChromaDB";

pub struct ChromaBackend {
    client: Client,
    config: ChromaConfig,
    collection_id: OnceCell<String>,
}

#[derive(Deserialize)]
struct Collection {
    id: String,
}

/// Column-oriented query result, one row per query embedding
#[derive(Debug, Deserialize)]
pub struct QueryResult {
    pub ids: Vec<Vec<String>>,
    #[serde(default)]
    pub documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    pub metadatas: Option<Vec<Vec<Option<Value>>>>,
    #[serde(default)]
    pub distances: Option<Vec<Vec<f32>>>,
}

impl QueryResult {
    /// Rows of the first query, score = 1 - cosine distance
    pub fn into_scored(self) -> Vec<ScoredChunk> {
        let Some(ids) = self.ids.into_iter().next() else {
            return Vec::new();
        };
        let documents = self
            .documents
            .and_then(|d| d.into_iter().next())
            .unwrap_or_default();
        let metadatas = self
            .metadatas
            .and_then(|m| m.into_iter().next())
            .unwrap_or_default();
        let distances = self
            .distances
            .and_then(|d| d.into_iter().next())
            .unwrap_or_default();

        ids.into_iter()
            .enumerate()
            .filter_map(|(i, id)| {
                let text = documents.get(i).cloned().flatten()?;
                let index = metadatas
                    .get(i)
                    .and_then(|m| m.as_ref())
                    .and_then(|m| m.get("index"))
                    .and_then(Value::as_u64)
                    .unwrap_or(0) as u32;
                let distance = distances.get(i).copied().unwrap_or(1.0);
                Some(ScoredChunk {
                    chunk: Chunk { id, index, text },
                    score: 1.0 - distance,
                })
            })
            .collect()
    }
}

impl ChromaBackend {
    pub fn new(config: ChromaConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            collection_id: OnceCell::new(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn post(&self, path: &str, body: &Value) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| Error::upstream(SERVICE, format!("{} request: {}", path, e)))?;

        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        tracing::warn!("ChromaDB {} failed: HTTP {}", path, status);
        Err(Error::upstream(SERVICE, format!("{}: HTTP {} - {}", path, status, body)))
    }

    /// Resolve (creating on first use) the collection id
    async fn collection(&self) -> Result<&str> {
        let id = self
            .collection_id
            .get_or_try_init(|| async {
                let response = self
                    .post(
                        "/collections",
                        &json!({
                            "name": self.config.collection,
                            "metadata": { "hnsw:space": "cosine" },
                            "get_or_create": true,
                        }),
                    )
                    .await?;
                let collection: Collection = response.json().await.map_err(|e| {
                    Error::upstream(SERVICE, format!("invalid collection response: {}", e))
                })?;
                tracing::info!("Using ChromaDB collection {} ({})", self.config.collection, collection.id);
                Ok::<_, Error>(collection.id)
            })
            .await?;
        Ok(id.as_str())
    }
}

#[async_trait]
impl VectorBackend for ChromaBackend {
    fn name(&self) -> &str {
        "chromadb"
    }

    async fn upsert(&self, key: &ChunkSetKey, chunks: &[EmbeddedChunk]) -> Result<usize> {
        let collection = self.collection().await?;
        let slug = key.slug();

        self.post(
            &format!("/collections/{}/delete", collection),
            &json!({ "where": { "chunk_set": slug } }),
        )
        .await?;

        if chunks.is_empty() {
            return Ok(0);
        }

        let ids: Vec<&str> = chunks.iter().map(|c| c.chunk.id.as_str()).collect();
        let embeddings: Vec<&[f32]> = chunks.iter().map(|c| c.embedding.as_slice()).collect();
        let documents: Vec<&str> = chunks.iter().map(|c| c.chunk.text.as_str()).collect();
        let metadatas: Vec<Value> = chunks
            .iter()
            .map(|c| json!({ "chunk_set": slug, "index": c.chunk.index }))
            .collect();

        self.post(
            &format!("/collections/{}/upsert", collection),
            &json!({
                "ids": ids,
                "embeddings": embeddings,
                "documents": documents,
                "metadatas": metadatas,
            }),
        )
        .await?;

        Ok(chunks.len())
    }

    async fn search(
        &self,
        key: &ChunkSetKey,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let collection = self.collection().await?;
        let response = self
            .post(
                &format!("/collections/{}/query", collection),
                &json!({
                    "query_embeddings": [query_embedding],
                    "n_results": top_k,
                    "where": { "chunk_set": key.slug() },
                    "include": ["documents", "metadatas", "distances"],
                }),
            )
            .await?;

        let result: QueryResult = response
            .json()
            .await
            .map_err(|e| Error::upstream(SERVICE, format!("invalid query response: {}", e)))?;
        Ok(result.into_scored())
    }

    async fn health_check(&self) -> Result<bool> {
        match self.client.get(self.url("/heartbeat")).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }
}
