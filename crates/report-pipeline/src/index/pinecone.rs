//! Pinecone data-plane backend
//!
//! Each chunk set lives in its own namespace (the chunk set slug), so replacing
//! a set is a namespace wipe followed by an upsert.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

use super::VectorBackend;
use crate::config::PineconeConfig;
use crate::error::{Error, Result};
use crate::types::{Chunk, ChunkSetKey, EmbeddedChunk, ScoredChunk};

const SERVICE: &str = "Pinecone";
const UPSERT_BATCH: usize = 100;

pub struct PineconeBackend {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Serialize)]
struct Vector<'a> {
    id: &'a str,
    values: &'a [f32],
    metadata: VectorMetadata<'a>,
}

#[derive(Serialize)]
struct VectorMetadata<'a> {
    text: &'a str,
    index: u32,
    chunk_set: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    upserted_count: usize,
}

#[derive(Debug, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub matches: Vec<Match>,
}

#[derive(Debug, Deserialize)]
pub struct Match {
    pub id: String,
    pub score: f32,
    #[serde(default)]
    pub metadata: Option<MatchMetadata>,
}

#[derive(Debug, Deserialize)]
pub struct MatchMetadata {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub index: f64,
}

impl QueryResponse {
    /// Matches that carry their chunk text, in Pinecone's ranking order
    pub fn into_scored(self) -> Vec<ScoredChunk> {
        self.matches
            .into_iter()
            .filter_map(|m| {
                let metadata = m.metadata?;
                Some(ScoredChunk {
                    chunk: Chunk {
                        id: m.id,
                        // Pinecone stores metadata numbers as floats
                        index: metadata.index as u32,
                        text: metadata.text,
                    },
                    score: m.score,
                })
            })
            .collect()
    }
}

impl PineconeBackend {
    pub fn new(config: PineconeConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        let host = config.index_host.trim_end_matches('/');
        let base_url = if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("https://{}", host)
        };

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key,
        })
    }

    async fn post(&self, path: &str, body: &serde_json::Value) -> Result<reqwest::Response> {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .header("Api-Key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::upstream(SERVICE, format!("{} request: {}", path, e)))
    }

    async fn check(path: &str, response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        tracing::warn!("Pinecone {} failed: HTTP {}", path, status);
        Err(Error::upstream(SERVICE, format!("{}: HTTP {} - {}", path, status, body)))
    }

    async fn clear_namespace(&self, namespace: &str) -> Result<()> {
        let path = "/vectors/delete";
        let response = self
            .post(path, &json!({ "deleteAll": true, "namespace": namespace }))
            .await?;
        // A namespace that was never written does not exist yet
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::check(path, response).await?;
        Ok(())
    }
}

#[async_trait]
impl VectorBackend for PineconeBackend {
    fn name(&self) -> &str {
        "pinecone"
    }

    async fn upsert(&self, key: &ChunkSetKey, chunks: &[EmbeddedChunk]) -> Result<usize> {
        let namespace = key.slug();
        self.clear_namespace(&namespace).await?;

        let mut upserted = 0;
        for batch in chunks.chunks(UPSERT_BATCH) {
            let vectors: Vec<Vector<'_>> = batch
                .iter()
                .map(|entry| Vector {
                    id: &entry.chunk.id,
                    values: &entry.embedding,
                    metadata: VectorMetadata {
                        text: &entry.chunk.text,
                        index: entry.chunk.index,
                        chunk_set: &namespace,
                    },
                })
                .collect();

            let path = "/vectors/upsert";
            let response = self
                .post(path, &json!({ "vectors": vectors, "namespace": namespace }))
                .await?;
            let response: UpsertResponse = Self::check(path, response)
                .await?
                .json()
                .await
                .map_err(|e| Error::upstream(SERVICE, format!("invalid upsert response: {}", e)))?;
            upserted += response.upserted_count;
        }

        tracing::debug!("Pinecone namespace {} now holds {} vectors", namespace, upserted);
        Ok(upserted)
    }

    async fn search(
        &self,
        key: &ChunkSetKey,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let path = "/query";
        let response = self
            .post(
                path,
                &json!({
                    "namespace": key.slug(),
                    "vector": query_embedding,
                    "topK": top_k,
                    "includeMetadata": true,
                }),
            )
            .await?;

        let response: QueryResponse = Self::check(path, response)
            .await?
            .json()
            .await
            .map_err(|e| Error::upstream(SERVICE, format!("invalid query response: {}", e)))?;

        Ok(response.into_scored())
    }

    async fn health_check(&self) -> Result<bool> {
        match self.post("/describe_index_stats", &json!({})).await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChunkStrategy, ReportPeriod};
    use axum::{extract::State, http::HeaderMap, http::StatusCode, routing::post, Json, Router};
    use serde_json::Value;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// In-memory stand-in for a Pinecone index host
    #[derive(Default)]
    struct FakeIndex {
        calls: Vec<(&'static str, Value)>,
        namespaces: HashMap<String, Vec<Value>>,
    }

    type Shared = Arc<Mutex<FakeIndex>>;

    fn authorized(headers: &HeaderMap) -> bool {
        headers.get("Api-Key").map(|v| v == "test-key").unwrap_or(false)
    }

    async fn delete(
        State(index): State<Shared>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> StatusCode {
        if !authorized(&headers) {
            return StatusCode::UNAUTHORIZED;
        }
        let mut index = index.lock().unwrap();
        let namespace = body["namespace"].as_str().unwrap_or_default().to_string();
        index.calls.push(("delete", body));
        match index.namespaces.remove(&namespace) {
            Some(_) => StatusCode::OK,
            None => StatusCode::NOT_FOUND,
        }
    }

    async fn upsert(
        State(index): State<Shared>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> std::result::Result<Json<Value>, StatusCode> {
        if !authorized(&headers) {
            return Err(StatusCode::UNAUTHORIZED);
        }
        let mut index = index.lock().unwrap();
        let namespace = body["namespace"].as_str().unwrap_or_default().to_string();
        let vectors = body["vectors"].as_array().cloned().unwrap_or_default();
        let count = vectors.len();
        index.calls.push(("upsert", body));
        index.namespaces.entry(namespace).or_default().extend(vectors);
        Ok(Json(json!({ "upsertedCount": count })))
    }

    async fn query(State(index): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
        let mut index = index.lock().unwrap();
        let namespace = body["namespace"].as_str().unwrap_or_default().to_string();
        let top_k = body["topK"].as_u64().unwrap_or(0) as usize;
        let matches: Vec<Value> = index
            .namespaces
            .get(&namespace)
            .map(|vectors| {
                vectors
                    .iter()
                    .take(top_k)
                    .enumerate()
                    .map(|(i, v)| {
                        json!({
                            "id": v["id"],
                            "score": 0.9 - 0.1 * i as f64,
                            "values": [],
                            "metadata": v["metadata"],
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        index.calls.push(("query", body));
        Json(json!({ "matches": matches, "namespace": namespace }))
    }

    async fn fake_pinecone() -> (String, Shared) {
        let state = Shared::default();
        let app = Router::new()
            .route("/vectors/delete", post(delete))
            .route("/vectors/upsert", post(upsert))
            .route("/query", post(query))
            .with_state(Arc::clone(&state));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), state)
    }

    fn chunk_set() -> ChunkSetKey {
        ChunkSetKey::new(
            ReportPeriod::new("2024", "Q1").unwrap(),
            "docling",
            ChunkStrategy::Markdown,
        )
    }

    fn embedded(key: &ChunkSetKey, count: usize) -> Vec<EmbeddedChunk> {
        let texts = (0..count).map(|i| format!("Section {} text", i)).collect();
        Chunk::from_texts(key, texts)
            .into_iter()
            .map(|chunk| EmbeddedChunk {
                embedding: vec![chunk.index as f32, 1.0],
                chunk,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_upsert_clears_namespace_then_batches() {
        let (url, index) = fake_pinecone().await;
        let backend = PineconeBackend::new(PineconeConfig::new("test-key".to_string(), url)).unwrap();
        let key = chunk_set();

        // First write: the namespace does not exist yet and delete answers 404
        let upserted = backend.upsert(&key, &embedded(&key, 150)).await.unwrap();
        assert_eq!(upserted, 150);

        let index = index.lock().unwrap();
        let order: Vec<&str> = index.calls.iter().map(|(path, _)| *path).collect();
        assert_eq!(order, vec!["delete", "upsert", "upsert"]);
        for (_, body) in &index.calls {
            assert_eq!(body["namespace"], key.slug());
        }
        assert_eq!(index.calls[0].1["deleteAll"], true);
        assert_eq!(index.calls[1].1["vectors"].as_array().unwrap().len(), 100);
        assert_eq!(index.calls[2].1["vectors"][0]["metadata"]["chunk_set"], key.slug());
    }

    #[tokio::test]
    async fn test_reupload_replaces_and_search_maps_matches() {
        let (url, index) = fake_pinecone().await;
        let backend = PineconeBackend::new(PineconeConfig::new("test-key".to_string(), url)).unwrap();
        let key = chunk_set();

        backend.upsert(&key, &embedded(&key, 5)).await.unwrap();
        backend.upsert(&key, &embedded(&key, 2)).await.unwrap();

        let scored = backend.search(&key, &[0.0, 1.0], 10).await.unwrap();
        assert_eq!(scored.len(), 2);
        assert_eq!(scored[0].chunk, Chunk::new(&key, 0, "Section 0 text".to_string()));
        assert_eq!(scored[1].chunk.index, 1);
        assert!((scored[0].score - 0.9).abs() < 1e-6);

        let index = index.lock().unwrap();
        let (path, body) = index.calls.last().unwrap();
        assert_eq!(*path, "query");
        assert_eq!(body["namespace"], key.slug());
        assert_eq!(body["topK"], 10);
        assert_eq!(body["includeMetadata"], true);
    }

    #[tokio::test]
    async fn test_rejected_api_key_is_upstream_error() {
        let (url, _) = fake_pinecone().await;
        let backend = PineconeBackend::new(PineconeConfig::new("wrong".to_string(), url)).unwrap();
        let key = chunk_set();

        let err = backend.upsert(&key, &embedded(&key, 1)).await.unwrap_err();
        assert!(matches!(err, Error::Upstream { ref service, .. } if service == "Pinecone"));
    }

    #[test]
    fn test_host_normalisation() {
        let backend = PineconeBackend::new(PineconeConfig::new(
            "key".to_string(),
            "reports-abc.svc.us-east-1.pinecone.io/".to_string(),
        ))
        .unwrap();
        assert_eq!(backend.base_url, "https://reports-abc.svc.us-east-1.pinecone.io");

        let backend = PineconeBackend::new(PineconeConfig::new(
            "key".to_string(),
            "http://localhost:5080".to_string(),
        ))
        .unwrap();
        assert_eq!(backend.base_url, "http://localhost:5080");
    }

    #[test]
    fn test_query_response_parsing() {
        let raw = r#"{
            "results": [],
            "matches": [
                {"id": "a1", "score": 0.92, "values": [], "metadata": {"text": "Revenue grew.", "index": 3.0, "chunk_set": "2024-q1-docling-markdown"}},
                {"id": "b2", "score": 0.41, "values": []}
            ],
            "namespace": "2024-q1-docling-markdown"
        }"#;
        let scored = serde_json::from_str::<QueryResponse>(raw).unwrap().into_scored();

        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].chunk.id, "a1");
        assert_eq!(scored[0].chunk.index, 3);
        assert_eq!(scored[0].chunk.text, "Revenue grew.");
    }
}
