//! Provider abstractions for embeddings and language models
//!
//! Trait-based so the pipeline can switch between the offline hashing embedder
//! and a local Ollama server without touching the stages.

pub mod embedding;
pub mod hashing;
pub mod llm;
pub mod ollama;

pub use embedding::{cosine_similarity, EmbeddingProvider};
pub use hashing::HashingEmbedder;
pub use llm::LlmProvider;
pub use ollama::{OllamaClient, OllamaEmbedder, OllamaLlm};
