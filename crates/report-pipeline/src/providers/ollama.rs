//! Ollama-based providers for embeddings and generation

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use super::embedding::{check_dimensions, EmbeddingProvider};
use super::llm::LlmProvider;
use crate::config::LlmConfig;
use crate::error::{Error, Result};
use crate::generation::PromptBuilder;

const SERVICE: &str = "Ollama";

/// Ollama API client with automatic retry
pub struct OllamaClient {
    client: Client,
    config: LlmConfig,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

impl OllamaClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Retry a request with exponential backoff
    async fn retry_request<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let max_retries = self.config.max_retries;
        let mut last_error = None;

        for attempt in 0..=max_retries {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    last_error = Some(e);
                    if attempt < max_retries {
                        let delay = Duration::from_secs(2u64.pow(attempt));
                        tracing::warn!(
                            "Ollama request failed (attempt {}/{}), retrying in {:?}",
                            attempt + 1,
                            max_retries + 1,
                            delay
                        );
                        sleep(delay).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::upstream(SERVICE, "unknown error")))
    }

    /// Check if Ollama is available
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.config.base_url.trim_end_matches('/'));

        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    /// POST `body` to `path` (with retry) and decode the JSON reply
    async fn post_json<B, T>(&self, path: &str, body: &B, what: &str) -> Result<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);
        let url = url.as_str();
        let client = &self.client;

        self.retry_request(move || async move {
            let response = client
                .post(url)
                .json(body)
                .send()
                .await
                .map_err(|e| Error::upstream(SERVICE, format!("{} request: {}", what, e)))?;

            let status = response.status();
            if !status.is_success() {
                let detail = response.text().await.unwrap_or_default();
                return Err(Error::upstream(
                    SERVICE,
                    format!("{}: HTTP {} - {}", what, status, detail),
                ));
            }

            response
                .json::<T>()
                .await
                .map_err(|e| Error::upstream(SERVICE, format!("invalid {} response: {}", what, e)))
        })
        .await
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbedRequest {
            model: &self.config.embed_model,
            prompt: text,
        };
        let response: EmbedResponse = self.post_json("/api/embeddings", &request, "embedding").await?;
        Ok(response.embedding)
    }

    pub async fn generate(&self, prompt: &str) -> Result<String> {
        tracing::info!("Generating with model: {}", self.config.generate_model);
        let request = GenerateRequest {
            model: &self.config.generate_model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.config.temperature,
            },
        };
        let response: GenerateResponse = self.post_json("/api/generate", &request, "generation").await?;
        Ok(response.response.trim().to_string())
    }
}

/// Ollama embedding provider using nomic-embed-text or similar models
pub struct OllamaEmbedder {
    client: Arc<OllamaClient>,
    dimensions: usize,
}

impl OllamaEmbedder {
    pub fn from_client(client: Arc<OllamaClient>, dimensions: usize) -> Self {
        Self { client, dimensions }
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let vector = self.client.embed(text).await?;
        check_dimensions(self, &vector)?;
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

/// Ollama LLM provider for answers and summaries
pub struct OllamaLlm {
    client: Arc<OllamaClient>,
    model: String,
}

impl OllamaLlm {
    pub fn from_client(client: Arc<OllamaClient>, model: String) -> Self {
        Self { client, model }
    }
}

#[async_trait]
impl LlmProvider for OllamaLlm {
    async fn answer(&self, question: &str, context: &str) -> Result<String> {
        self.client
            .generate(&PromptBuilder::answer_prompt(question, context))
            .await
    }

    async fn summarize(&self, context: &str) -> Result<String> {
        self.client
            .generate(&PromptBuilder::summary_prompt(context))
            .await
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Json, Router};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicU32, Ordering};

    async fn fake_ollama(failures: u32) -> (String, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let app = Router::new()
            .route(
                "/api/generate",
                post(move |Json(body): Json<Value>| {
                    let counter = Arc::clone(&counter);
                    async move {
                        let n = counter.fetch_add(1, Ordering::SeqCst);
                        if n < failures {
                            return Err(axum::http::StatusCode::SERVICE_UNAVAILABLE);
                        }
                        let prompt = body["prompt"].as_str().unwrap_or_default().len();
                        Ok(Json(json!({"response": format!("  {} prompt chars  ", prompt)})))
                    }
                }),
            )
            .route(
                "/api/embeddings",
                post(|| async { Json(json!({"embedding": [0.5, 0.5, 0.0]})) }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), calls)
    }

    fn config(base_url: String, max_retries: u32) -> LlmConfig {
        LlmConfig {
            base_url,
            max_retries,
            timeout_secs: 5,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_generate_retries_then_succeeds() {
        let (url, calls) = fake_ollama(1).await;
        let client = OllamaClient::new(&config(url, 2)).unwrap();

        let text = client.generate("abcd").await.unwrap();
        assert_eq!(text, "4 prompt chars");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_generate_gives_up_after_retries() {
        let (url, calls) = fake_ollama(u32::MAX).await;
        let client = OllamaClient::new(&config(url, 0)).unwrap();

        let err = client.generate("abcd").await.unwrap_err();
        assert!(matches!(err, Error::Upstream { ref service, .. } if service == "Ollama"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_embedder_checks_dimensions() {
        let (url, _) = fake_ollama(0).await;
        let client = Arc::new(OllamaClient::new(&config(url, 0)).unwrap());

        let embedder = OllamaEmbedder::from_client(Arc::clone(&client), 3);
        assert_eq!(embedder.embed("revenue").await.unwrap(), vec![0.5, 0.5, 0.0]);

        let embedder = OllamaEmbedder::from_client(client, 768);
        assert!(matches!(embedder.embed("revenue").await, Err(Error::Upstream { .. })));
    }
}
