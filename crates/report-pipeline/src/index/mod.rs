//! Vector indexing, retrieval and answer generation
//!
//! Backends are interchangeable behind [`VectorBackend`] and share no state:
//! - `ManualBackend` (`manual`): in-process, cosine similarity
//! - `PineconeBackend` (`pinecone`): one namespace per chunk set
//! - `ChromaBackend` (`chromadb`): one collection, filtered by chunk set
//!
//! Re-uploading a chunk set replaces whatever the backend held for its key.

pub mod chroma;
pub mod memory;
pub mod pinecone;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{RetrievalConfig, VectorStoresConfig};
use crate::error::{Error, Result};
use crate::generation::PromptBuilder;
use crate::providers::{EmbeddingProvider, LlmProvider};
use crate::registry::Registry;
use crate::types::{Chunk, ChunkSetKey, EmbeddedChunk, ScoredChunk};

pub use chroma::ChromaBackend;
pub use memory::ManualBackend;
pub use pinecone::PineconeBackend;

/// Query used to pull representative chunks for a whole-report summary
const SUMMARY_QUERY: &str =
    "quarterly financial results revenue earnings margins segments outlook guidance risks";

/// Trait for vector stores keyed by chunk set
#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// Name clients select the backend by
    fn name(&self) -> &str;

    /// Replace every entry of `key` with `chunks`; returns the number stored
    async fn upsert(&self, key: &ChunkSetKey, chunks: &[EmbeddedChunk]) -> Result<usize>;

    /// Nearest chunks of `key`, most similar first
    async fn search(
        &self,
        key: &ChunkSetKey,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>>;

    /// Check if the backend is reachable
    async fn health_check(&self) -> Result<bool>;
}

/// Backend registry keyed by backend name
pub type BackendRegistry = Registry<dyn VectorBackend>;

/// Register `manual` plus every configured remote backend
pub fn build_backends(config: &VectorStoresConfig) -> Result<BackendRegistry> {
    let mut registry: BackendRegistry = Registry::new("backend");
    registry.register("manual", Arc::new(ManualBackend::new()));

    if let Some(pinecone) = &config.pinecone {
        registry.register("pinecone", Arc::new(PineconeBackend::new(pinecone.clone())?));
    }
    if let Some(chroma) = &config.chroma {
        registry.register("chromadb", Arc::new(ChromaBackend::new(chroma.clone())?));
        registry.alias("chroma", "chromadb");
    }

    tracing::info!("Vector backends: {}", registry.names().join(", "));
    Ok(registry)
}

/// Answer plus the chunks it was grounded on
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub answer: String,
    pub sources: Vec<ScoredChunk>,
}

/// Embeds, indexes and queries chunk sets on any backend
pub struct RetrievalService {
    embedder: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn LlmProvider>,
    config: RetrievalConfig,
}

impl RetrievalService {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            llm,
            config,
        }
    }

    /// Embed `chunks` and replace the backend's entries for `key`
    pub async fn upload(
        &self,
        backend: &dyn VectorBackend,
        key: &ChunkSetKey,
        chunks: Vec<Chunk>,
    ) -> Result<usize> {
        if chunks.is_empty() {
            return Err(Error::validation(format!("No chunks to upload for {}", key)));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(Error::internal(format!(
                "{} returned {} embeddings for {} chunks",
                self.embedder.name(),
                embeddings.len(),
                chunks.len()
            )));
        }

        let embedded: Vec<EmbeddedChunk> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| EmbeddedChunk { chunk, embedding })
            .collect();

        let count = backend.upsert(key, &embedded).await?;
        tracing::info!("Uploaded {} chunks of {} to {}", count, key, backend.name());
        Ok(count)
    }

    /// Grounded answer to `question` from the chunks of `key`
    pub async fn query(
        &self,
        backend: &dyn VectorBackend,
        key: &ChunkSetKey,
        question: &str,
        top_k: Option<usize>,
    ) -> Result<QueryOutcome> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::validation("Enter a question first"));
        }
        let top_k = top_k.unwrap_or(self.config.top_k).max(1);

        let query_embedding = self.embedder.embed(question).await?;
        let sources = backend.search(key, &query_embedding, top_k).await?;
        if sources.is_empty() {
            return Err(Self::nothing_indexed(backend, key));
        }

        let context = PromptBuilder::build_context(&sources);
        let answer = self.llm.answer(question, &context).await?;
        tracing::info!(
            "Answered question on {} via {} with {} sources",
            key,
            backend.name(),
            sources.len()
        );

        Ok(QueryOutcome { answer, sources })
    }

    /// Summary of the report behind `key`
    pub async fn summarize(&self, backend: &dyn VectorBackend, key: &ChunkSetKey) -> Result<String> {
        let query_embedding = self.embedder.embed(SUMMARY_QUERY).await?;
        let mut chunks = backend
            .search(key, &query_embedding, self.config.summary_chunks.max(1))
            .await?;
        if chunks.is_empty() {
            return Err(Self::nothing_indexed(backend, key));
        }

        // Back to document order so the model reads the report as written
        chunks.sort_by_key(|c| c.chunk.index);
        let context = PromptBuilder::build_context(&chunks);
        let summary = self.llm.summarize(&context).await?;
        tracing::info!("Summarized {} from {} chunks", key, chunks.len());
        Ok(summary)
    }

    fn nothing_indexed(backend: &dyn VectorBackend, key: &ChunkSetKey) -> Error {
        Error::not_found(format!(
            "No chunks indexed for {} in {}; upload them first",
            key,
            backend.name()
        ))
    }
}
