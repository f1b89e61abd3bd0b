//! Application state for the pipeline server

use std::sync::Arc;
use std::time::Duration;

use crate::chunking::Chunker;
use crate::config::{EmbeddingBackend, PipelineConfig, StorageBackend};
use crate::conversion::{build_converters, ConversionService, ConverterRegistry};
use crate::error::{Error, Result};
use crate::index::{build_backends, BackendRegistry, RetrievalService};
use crate::providers::{
    EmbeddingProvider, HashingEmbedder, LlmProvider, OllamaClient, OllamaEmbedder, OllamaLlm,
};
use crate::storage::{LocalObjectStore, ObjectStore};
use crate::types::api::ChunkSetRequest;
use crate::types::ChunkSetKey;
use crate::workflow::{AirflowTrigger, WorkflowTrigger};

/// Shared application state
///
/// Everything inside is immutable wiring; request handlers hold no other state.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: PipelineConfig,
    store: Arc<dyn ObjectStore>,
    workflow: Arc<dyn WorkflowTrigger>,
    converters: ConverterRegistry,
    conversion: ConversionService,
    chunker: Chunker,
    backends: BackendRegistry,
    retrieval: RetrievalService,
}

/// Collaborators the state is assembled from
pub struct StateParts {
    pub store: Arc<dyn ObjectStore>,
    pub workflow: Arc<dyn WorkflowTrigger>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub llm: Arc<dyn LlmProvider>,
    pub converters: ConverterRegistry,
    pub backends: BackendRegistry,
}

impl AppState {
    /// Create application state from configuration
    pub async fn new(config: PipelineConfig) -> Result<Self> {
        tracing::info!("Initializing pipeline state (storage: {:?})...", config.storage.backend);

        let store = Self::build_store(&config).await?;
        tracing::info!("Object store initialized ({})", store.name());

        let ollama = Arc::new(OllamaClient::new(&config.llm)?);
        let embedder: Arc<dyn EmbeddingProvider> = match config.embeddings.provider {
            EmbeddingBackend::Hashing => Arc::new(HashingEmbedder::new(config.embeddings.dimensions)),
            EmbeddingBackend::Ollama => Arc::new(OllamaEmbedder::from_client(
                Arc::clone(&ollama),
                config.embeddings.dimensions,
            )),
        };
        let llm: Arc<dyn LlmProvider> = Arc::new(OllamaLlm::from_client(
            Arc::clone(&ollama),
            config.llm.generate_model.clone(),
        ));
        tracing::info!(
            "Providers initialized (embeddings: {}, llm: {}/{})",
            embedder.name(),
            llm.name(),
            llm.model()
        );

        let workflow: Arc<dyn WorkflowTrigger> = Arc::new(AirflowTrigger::new(config.workflow.clone())?);
        let converters = build_converters(&config.conversion)?;
        let backends = build_backends(&config.vector_stores)?;

        Ok(Self::from_parts(
            config,
            StateParts {
                store,
                workflow,
                embedder,
                llm,
                converters,
                backends,
            },
        ))
    }

    /// Assemble state from explicit collaborators
    pub fn from_parts(config: PipelineConfig, parts: StateParts) -> Self {
        let conversion = ConversionService::new(
            Arc::clone(&parts.store),
            Duration::from_secs(config.storage.presign_ttl_secs),
        );
        let chunker = Chunker::new(config.chunking.clone(), Arc::clone(&parts.embedder));
        let retrieval = RetrievalService::new(parts.embedder, parts.llm, config.retrieval.clone());

        Self {
            inner: Arc::new(AppStateInner {
                config,
                store: parts.store,
                workflow: parts.workflow,
                converters: parts.converters,
                conversion,
                chunker,
                backends: parts.backends,
                retrieval,
            }),
        }
    }

    async fn build_store(config: &PipelineConfig) -> Result<Arc<dyn ObjectStore>> {
        match config.storage.backend {
            StorageBackend::Local => Ok(Arc::new(LocalObjectStore::new(
                config.storage.root.clone(),
                config.server.public_url.clone(),
                config.storage.signing_secret.as_bytes(),
            )?)),
            StorageBackend::Gcs => {
                #[cfg(feature = "gcp")]
                {
                    let store =
                        crate::storage::GcsObjectStore::new(config.storage.bucket.clone()).await?;
                    Ok(Arc::new(store))
                }
                #[cfg(not(feature = "gcp"))]
                {
                    Err(Error::Config(
                        "storage.backend = \"gcs\" requires the `gcp` feature".to_string(),
                    ))
                }
            }
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.inner.store
    }

    pub fn workflow(&self) -> &Arc<dyn WorkflowTrigger> {
        &self.inner.workflow
    }

    pub fn converters(&self) -> &ConverterRegistry {
        &self.inner.converters
    }

    pub fn conversion(&self) -> &ConversionService {
        &self.inner.conversion
    }

    pub fn chunker(&self) -> &Chunker {
        &self.inner.chunker
    }

    pub fn backends(&self) -> &BackendRegistry {
        &self.inner.backends
    }

    pub fn retrieval(&self) -> &RetrievalService {
        &self.inner.retrieval
    }

    pub fn presign_ttl(&self) -> Duration {
        Duration::from_secs(self.inner.config.storage.presign_ttl_secs)
    }

    /// Validate a chunk set selection and key it by the parser's storage prefix
    ///
    /// `layout` and `docling` name the same markdown, so both map to one key.
    pub fn resolve_chunk_set(&self, request: &ChunkSetRequest) -> Result<ChunkSetKey> {
        let mut key = request.key()?;
        let converter = self.converters().get(&key.parser)?;
        key.parser = converter.storage_prefix().to_string();
        Ok(key)
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("store", &self.inner.store.name())
            .field("workflow", &self.inner.workflow.name())
            .field("parsers", &self.inner.converters.names())
            .field("backends", &self.inner.backends.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_new_with_local_defaults() {
        let dir = TempDir::new().unwrap();
        let mut config = PipelineConfig::default();
        config.storage.root = dir.path().join("bucket");

        let state = AppState::new(config).await.unwrap();
        assert_eq!(state.store().name(), "local-filesystem");
        assert_eq!(state.converters().names(), vec!["layout"]);
        assert_eq!(state.backends().names(), vec!["manual"]);
        assert_eq!(state.presign_ttl(), Duration::from_secs(3600));
    }

    #[tokio::test]
    async fn test_parser_aliases_share_a_chunk_set() {
        let dir = TempDir::new().unwrap();
        let mut config = PipelineConfig::default();
        config.storage.root = dir.path().to_path_buf();
        let state = AppState::new(config).await.unwrap();

        let request = |parser: &str| ChunkSetRequest {
            year: "2024".to_string(),
            quarter: "Q1".to_string(),
            parser: parser.to_string(),
            strategy: "markdown".to_string(),
        };
        let layout = state.resolve_chunk_set(&request("layout")).unwrap();
        let docling = state.resolve_chunk_set(&request("Docling")).unwrap();

        assert_eq!(layout, docling);
        assert_eq!(layout.markdown_key(), "docling_markdown/2024/Q1/Q1.md");
        assert!(matches!(
            state.resolve_chunk_set(&request("mistral")),
            Err(Error::Validation(_))
        ));
    }
}
