//! In-process vector backend

use async_trait::async_trait;
use dashmap::DashMap;

use super::VectorBackend;
use crate::error::Result;
use crate::providers::cosine_similarity;
use crate::types::{ChunkSetKey, EmbeddedChunk, ScoredChunk};

/// Exhaustive cosine search over chunk sets held in memory
///
/// Contents live as long as the process.
#[derive(Default)]
pub struct ManualBackend {
    sets: DashMap<String, Vec<EmbeddedChunk>>,
}

impl ManualBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of chunks stored for `key`
    pub fn count(&self, key: &ChunkSetKey) -> usize {
        self.sets.get(&key.slug()).map(|set| set.len()).unwrap_or(0)
    }
}

#[async_trait]
impl VectorBackend for ManualBackend {
    fn name(&self) -> &str {
        "manual"
    }

    async fn upsert(&self, key: &ChunkSetKey, chunks: &[EmbeddedChunk]) -> Result<usize> {
        self.sets.insert(key.slug(), chunks.to_vec());
        Ok(chunks.len())
    }

    async fn search(
        &self,
        key: &ChunkSetKey,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let Some(set) = self.sets.get(&key.slug()) else {
            return Ok(Vec::new());
        };

        let mut scored: Vec<ScoredChunk> = set
            .iter()
            .map(|entry| ScoredChunk {
                chunk: entry.chunk.clone(),
                score: cosine_similarity(query_embedding, &entry.embedding),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(a.chunk.index.cmp(&b.chunk.index))
        });
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}
