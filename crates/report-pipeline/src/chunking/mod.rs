//! Markdown chunking
//!
//! Three strategies, selected by [`ChunkStrategy`]:
//! - `markdown`: one chunk per heading section
//! - `semantic`: sentence groups split at embedding-distance breakpoints
//! - `recursive`: character windows with overlap

pub mod heading;
pub mod recursive;
pub mod semantic;

use std::sync::Arc;

use crate::config::ChunkingConfig;
use crate::error::{Error, Result};
use crate::providers::EmbeddingProvider;
use crate::storage::ObjectStore;
use crate::types::{Chunk, ChunkSetKey, ChunkStrategy};

pub use heading::split_by_headings;
pub use recursive::RecursiveSplitter;
pub use semantic::split_semantic;

/// Splits converted reports into ordered chunks
pub struct Chunker {
    config: ChunkingConfig,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl Chunker {
    pub fn new(config: ChunkingConfig, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { config, embedder }
    }

    /// Split markdown text with the given strategy
    pub async fn chunk(&self, markdown: &str, strategy: ChunkStrategy) -> Result<Vec<String>> {
        let chunks = match strategy {
            ChunkStrategy::Markdown => split_by_headings(markdown),
            ChunkStrategy::Recursive => {
                RecursiveSplitter::new(self.config.chunk_size, self.config.chunk_overlap)
                    .split(markdown)
            }
            ChunkStrategy::Semantic => {
                split_semantic(
                    markdown,
                    self.embedder.as_ref(),
                    self.config.semantic_breakpoint_percentile,
                )
                .await?
            }
        };
        Ok(chunks)
    }

    /// Read the markdown a chunk set derives from and split it
    ///
    /// A markdown artifact that is not there yet (e.g. its conversion run is
    /// still in flight) is reported as `NotFound`.
    pub async fn chunk_set(&self, store: &dyn ObjectStore, key: &ChunkSetKey) -> Result<Vec<Chunk>> {
        let markdown_key = key.markdown_key();
        if !store.exists(&markdown_key).await? {
            return Err(Error::not_found(format!(
                "Markdown not found for {} ({}); run the conversion first",
                key.period, markdown_key
            )));
        }

        let bytes = store.get(&markdown_key).await?;
        let markdown = String::from_utf8(bytes)
            .map_err(|e| Error::internal(format!("{} is not UTF-8: {}", markdown_key, e)))?;

        let texts = self.chunk(&markdown, key.strategy).await?;
        tracing::info!("Chunked {} into {} chunks", key, texts.len());
        Ok(Chunk::from_texts(key, texts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::HashingEmbedder;
    use crate::storage::LocalObjectStore;
    use crate::types::ReportPeriod;
    use tempfile::TempDir;

    const REPORT: &str = "# NVIDIA Announces Financial Results\n\nRecord quarterly revenue of $26.0 billion, up 18% from Q4.\n\n## Data Center\n\nData center revenue was $22.6 billion. It was up 23% from Q4.\n\n## Gaming\n\nGaming revenue was $2.6 billion.\n";

    fn chunker() -> Chunker {
        Chunker::new(
            ChunkingConfig {
                chunk_size: 80,
                chunk_overlap: 20,
                ..Default::default()
            },
            Arc::new(HashingEmbedder::new(64)),
        )
    }

    #[tokio::test]
    async fn test_every_strategy_is_deterministic() {
        let chunker = chunker();
        for strategy in ChunkStrategy::ALL {
            let first = chunker.chunk(REPORT, strategy).await.unwrap();
            let second = chunker.chunk(REPORT, strategy).await.unwrap();
            assert!(!first.is_empty(), "{} produced no chunks", strategy);
            assert_eq!(first, second, "{} is not deterministic", strategy);
        }
    }

    #[tokio::test]
    async fn test_heading_chunks_follow_document_order() {
        let chunks = chunker().chunk(REPORT, ChunkStrategy::Markdown).await.unwrap();
        assert_eq!(chunks.len(), 3);
        assert!(chunks[0].starts_with("# NVIDIA"));
        assert!(chunks[1].starts_with("## Data Center"));
        assert!(chunks[2].starts_with("## Gaming"));
    }

    #[tokio::test]
    async fn test_chunk_set_reads_markdown_from_store() {
        let dir = TempDir::new().unwrap();
        let store = LocalObjectStore::new(dir.path().to_path_buf(), "http://localhost:8000", b"k").unwrap();
        let key = ChunkSetKey::new(
            ReportPeriod::new("2024", "Q1").unwrap(),
            "docling",
            ChunkStrategy::Recursive,
        );

        let err = chunker().chunk_set(&store, &key).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        store
            .put(REPORT.as_bytes().to_vec(), "docling_markdown/2024/Q1/Q1.md")
            .await
            .unwrap();
        let first = chunker().chunk_set(&store, &key).await.unwrap();
        let second = chunker().chunk_set(&store, &key).await.unwrap();

        assert!(first.len() > 1);
        assert_eq!(first, second);
        assert!(first.iter().enumerate().all(|(i, c)| c.index == i as u32));
    }
}
