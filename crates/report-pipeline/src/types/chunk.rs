//! Chunk sets and their composite keys

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use super::period::ReportPeriod;
use crate::error::{Error, Result};

/// Text splitting strategy, selected by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStrategy {
    /// One chunk per markdown heading section
    Markdown,
    /// Breaks where neighbouring sentences drift apart in embedding space
    Semantic,
    /// Recursive character window with overlap
    Recursive,
}

impl ChunkStrategy {
    pub const ALL: [ChunkStrategy; 3] = [Self::Markdown, Self::Semantic, Self::Recursive];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Semantic => "semantic",
            Self::Recursive => "recursive",
        }
    }
}

impl FromStr for ChunkStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "markdown" | "heading" | "markdown_header" => Ok(Self::Markdown),
            "semantic" => Ok(Self::Semantic),
            "recursive" | "character" => Ok(Self::Recursive),
            "" => Err(Error::validation("Select a chunking strategy first")),
            other => Err(Error::validation(format!(
                "Unknown chunking strategy '{}' (expected markdown, semantic or recursive)",
                other
            ))),
        }
    }
}

impl fmt::Display for ChunkStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a chunk set: `(year, quarter, parser, strategy)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkSetKey {
    pub period: ReportPeriod,
    pub parser: String,
    pub strategy: ChunkStrategy,
}

impl ChunkSetKey {
    pub fn new(period: ReportPeriod, parser: impl Into<String>, strategy: ChunkStrategy) -> Self {
        Self {
            period,
            parser: parser.into(),
            strategy,
        }
    }

    /// Markdown artifact this chunk set is derived from
    pub fn markdown_key(&self) -> String {
        self.period.markdown_key(&self.parser)
    }

    /// Stable identifier usable as a namespace or metadata value
    pub fn slug(&self) -> String {
        format!(
            "{}-{}-{}-{}",
            self.period.year,
            self.period.quarter.to_lowercase(),
            self.parser.to_lowercase(),
            self.strategy
        )
    }
}

impl fmt::Display for ChunkSetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{} / {}]", self.period, self.parser, self.strategy)
    }
}

/// One text segment of a chunk set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Content-derived identifier; identical inputs give identical ids
    pub id: String,
    /// Position in document order
    pub index: u32,
    pub text: String,
}

impl Chunk {
    pub fn new(key: &ChunkSetKey, index: u32, text: String) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(key.slug().as_bytes());
        hasher.update(index.to_be_bytes());
        hasher.update(text.as_bytes());
        let digest = hasher.finalize();

        Self {
            id: hex::encode(&digest[..16]),
            index,
            text,
        }
    }

    /// Build the ordered chunk set from splitter output
    pub fn from_texts(key: &ChunkSetKey, texts: Vec<String>) -> Vec<Self> {
        texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| Self::new(key, i as u32, text))
            .collect()
    }
}

/// A chunk with its embedding, ready for a vector backend
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

/// A chunk returned by similarity search
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    /// Similarity score, higher is more similar
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(strategy: ChunkStrategy) -> ChunkSetKey {
        ChunkSetKey::new(ReportPeriod::new("2024", "Q2").unwrap(), "docling", strategy)
    }

    #[test]
    fn test_strategy_names() {
        assert_eq!("heading".parse::<ChunkStrategy>().unwrap(), ChunkStrategy::Markdown);
        assert_eq!("Semantic".parse::<ChunkStrategy>().unwrap(), ChunkStrategy::Semantic);
        assert_eq!("character".parse::<ChunkStrategy>().unwrap(), ChunkStrategy::Recursive);
        assert!(matches!(
            "sliding".parse::<ChunkStrategy>(),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_chunk_ids_are_reproducible() {
        let a = Chunk::new(&key(ChunkStrategy::Markdown), 0, "Revenue grew.".to_string());
        let b = Chunk::new(&key(ChunkStrategy::Markdown), 0, "Revenue grew.".to_string());
        let c = Chunk::new(&key(ChunkStrategy::Recursive), 0, "Revenue grew.".to_string());
        let d = Chunk::new(&key(ChunkStrategy::Markdown), 1, "Revenue grew.".to_string());

        assert_eq!(a.id, b.id);
        assert_ne!(a.id, c.id);
        assert_ne!(a.id, d.id);
        assert_eq!(a.id.len(), 32);
    }

    #[test]
    fn test_slug_and_markdown_key() {
        let key = key(ChunkStrategy::Semantic);
        assert_eq!(key.slug(), "2024-q2-docling-semantic");
        assert_eq!(key.markdown_key(), "docling_markdown/2024/Q2/Q2.md");
    }
}
