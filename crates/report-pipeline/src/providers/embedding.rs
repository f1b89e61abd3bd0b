//! Text to vector conversion for chunking and retrieval

use async_trait::async_trait;
use crate::error::{Error, Result};

/// Turns report text into vectors
///
/// Used for semantic chunk boundaries, for indexing chunks and for embedding
/// questions; all three must go through the same provider to be comparable.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed texts in order, one vector per text
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }

    /// Length of every vector this provider returns
    fn dimensions(&self) -> usize;

    async fn health_check(&self) -> Result<bool>;

    fn name(&self) -> &str;
}

/// Reject a vector whose length differs from what the provider promised
pub fn check_dimensions(provider: &dyn EmbeddingProvider, vector: &[f32]) -> Result<()> {
    if vector.len() != provider.dimensions() {
        return Err(Error::upstream(
            provider.name().to_string(),
            format!(
                "returned {} dimensions, expected {}",
                vector.len(),
                provider.dimensions()
            ),
        ));
    }
    Ok(())
}

/// Cosine similarity; zero vectors are similar to nothing
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }
}
