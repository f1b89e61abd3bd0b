//! LLM provider trait for answering and summarizing

use async_trait::async_trait;
use crate::error::Result;

/// Trait for LLM-based generation over retrieved report context
///
/// Implementations:
/// - `OllamaLlm`: Local Ollama server (llama3.2, phi3, etc.)
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Answer a question using only the given context
    async fn answer(&self, question: &str, context: &str) -> Result<String>;

    /// Summarize the given report excerpts
    async fn summarize(&self, context: &str) -> Result<String>;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;
}
