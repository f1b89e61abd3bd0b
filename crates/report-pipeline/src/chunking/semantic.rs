//! Embedding-distance sentence grouping
//!
//! Each sentence is embedded together with its neighbours. A new chunk starts
//! wherever the cosine distance to the next window lies above the configured
//! percentile of all neighbour distances.

use unicode_segmentation::UnicodeSegmentation;

use crate::error::Result;
use crate::providers::{cosine_similarity, EmbeddingProvider};

/// Sentences of `text`, trimmed, in order
pub fn sentences(text: &str) -> Vec<&str> {
    text.split_sentence_bounds()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Percentile with linear interpolation between closest ranks
pub fn percentile(values: &[f32], pct: f32) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (pct.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f32;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f32;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

pub async fn split_semantic(
    text: &str,
    embedder: &dyn EmbeddingProvider,
    breakpoint_percentile: f32,
) -> Result<Vec<String>> {
    let sentences = sentences(text);
    if sentences.len() < 2 {
        return Ok(sentences.into_iter().map(str::to_string).collect());
    }

    let windows: Vec<String> = (0..sentences.len())
        .map(|i| {
            let start = i.saturating_sub(1);
            let end = (i + 2).min(sentences.len());
            sentences[start..end].join(" ")
        })
        .collect();

    let embeddings = embedder.embed_batch(&windows).await?;
    let distances: Vec<f32> = embeddings
        .windows(2)
        .map(|pair| 1.0 - cosine_similarity(&pair[0], &pair[1]))
        .collect();

    let threshold = percentile(&distances, breakpoint_percentile);
    tracing::debug!(
        "Semantic split: {} sentences, breakpoint distance {:.4}",
        sentences.len(),
        threshold
    );

    let mut chunks = Vec::new();
    let mut start = 0;
    for (i, distance) in distances.iter().enumerate() {
        if *distance > threshold {
            chunks.push(sentences[start..=i].join(" "));
            start = i + 1;
        }
    }
    chunks.push(sentences[start..].join(" "));

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::HashingEmbedder;

    #[test]
    fn test_percentile() {
        let values = [0.1, 0.4, 0.2, 0.3, 0.5];
        assert!((percentile(&values, 50.0) - 0.3).abs() < 1e-6);
        assert!((percentile(&values, 100.0) - 0.5).abs() < 1e-6);
        assert!((percentile(&values, 95.0) - 0.48).abs() < 1e-5);
        assert_eq!(percentile(&[], 95.0), 0.0);
    }

    #[test]
    fn test_sentences() {
        assert_eq!(
            sentences("Revenue rose. Margins fell!  Why?"),
            vec!["Revenue rose.", "Margins fell!", "Why?"]
        );
    }

    #[tokio::test]
    async fn test_deterministic_and_lossless() {
        let embedder = HashingEmbedder::new(128);
        let text = "Revenue was a record $26.0 billion. Data center revenue rose 23%. \
                    Gaming revenue was $2.6 billion. The board declared a ten-for-one stock split. \
                    The dividend was raised by 150%. Shareholders will vote in June.";

        let first = split_semantic(text, &embedder, 80.0).await.unwrap();
        let second = split_semantic(text, &embedder, 80.0).await.unwrap();
        assert_eq!(first, second);
        assert!(first.len() >= 2);
        assert_eq!(first.join(" "), sentences(text).join(" "));
    }

    #[tokio::test]
    async fn test_single_sentence() {
        let embedder = HashingEmbedder::new(16);
        let chunks = split_semantic("Only one sentence here.", &embedder, 95.0)
            .await
            .unwrap();
        assert_eq!(chunks, vec!["Only one sentence here."]);
    }
}
