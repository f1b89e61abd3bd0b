//! Configuration for the report pipeline

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Main pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PipelineConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Object store configuration
    pub storage: StorageConfig,
    /// Workflow orchestrator (Airflow) configuration
    pub workflow: WorkflowConfig,
    /// PDF to markdown converters
    pub conversion: ConversionConfig,
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
    /// Ollama/LLM configuration
    pub llm: LlmConfig,
    /// Retrieval configuration
    pub retrieval: RetrievalConfig,
    /// Remote vector stores (each is optional)
    pub vector_stores: VectorStoresConfig,
}

impl PipelineConfig {
    /// Load configuration from an optional TOML file, then apply environment overrides
    ///
    /// When `path` is `None`, `REPORT_CONFIG` is consulted before falling back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os("REPORT_CONFIG").map(PathBuf::from));

        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(&path).map_err(|e| {
                    Error::Config(format!("Failed to read {}: {}", path.display(), e))
                })?;
                Self::from_toml(&raw)?
            }
            None => Self::default(),
        };

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::Config(format!("Invalid configuration: {}", e)))
    }

    /// Override settings from well-known environment variables
    pub fn apply_env(&mut self) {
        fn var(name: &str) -> Option<String> {
            std::env::var(name).ok().filter(|v| !v.trim().is_empty())
        }

        if let Some(root) = var("REPORT_STORAGE_ROOT") {
            self.storage.root = PathBuf::from(root);
        }
        if let Some(bucket) = var("GCS_BUCKET") {
            self.storage.bucket = bucket;
            self.storage.backend = StorageBackend::Gcs;
        }
        if let Some(secret) = var("PRESIGN_SECRET") {
            self.storage.signing_secret = secret;
        }
        if let Some(url) = var("PUBLIC_URL") {
            self.server.public_url = url;
        }
        if let Some(url) = var("AIRFLOW_URL") {
            self.workflow.base_url = url;
        }
        if let Some(user) = var("AIRFLOW_USERNAME") {
            self.workflow.username = user;
        }
        if let Some(password) = var("AIRFLOW_PASSWORD") {
            self.workflow.password = password;
        }
        if let Some(key) = var("MISTRAL_API_KEY") {
            self.conversion.model.api_key = Some(key);
        }
        if let Some(url) = var("OLLAMA_URL") {
            self.llm.base_url = url;
        }
        if let Some(key) = var("PINECONE_API_KEY") {
            let host = var("PINECONE_INDEX_HOST").unwrap_or_default();
            let pinecone = self
                .vector_stores
                .pinecone
                .get_or_insert_with(|| PineconeConfig::new(String::new(), String::new()));
            pinecone.api_key = key;
            if !host.is_empty() {
                pinecone.index_host = host;
            }
        }
        if let Some(url) = var("CHROMA_URL") {
            self.vector_stores
                .chroma
                .get_or_insert_with(ChromaConfig::default)
                .base_url = url;
        }
    }

    /// Reject settings that cannot work at runtime
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(Error::Config("chunking.chunk_size must be positive".to_string()));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(Error::Config(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if !(0.0..=100.0).contains(&self.chunking.semantic_breakpoint_percentile) {
            return Err(Error::Config(
                "chunking.semantic_breakpoint_percentile must be within 0..=100".to_string(),
            ));
        }
        if self.storage.presign_ttl_secs == 0 {
            return Err(Error::Config("storage.presign_ttl_secs must be positive".to_string()));
        }
        if self.storage.backend == StorageBackend::Gcs && self.storage.bucket.is_empty() {
            return Err(Error::Config("storage.bucket is required for the gcs backend".to_string()));
        }
        if let Some(pinecone) = &self.vector_stores.pinecone {
            if pinecone.api_key.is_empty() || pinecone.index_host.is_empty() {
                return Err(Error::Config(
                    "vector_stores.pinecone needs both api_key and index_host".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Externally reachable base URL, used for local presigned links
    pub public_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            enable_cors: true,
            public_url: "http://localhost:8000".to_string(),
        }
    }
}

/// Object store backend selection
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Directory tree on the local filesystem
    #[default]
    Local,
    /// Google Cloud Storage bucket
    Gcs,
}

/// Object store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Root directory for the local backend
    pub root: PathBuf,
    /// Bucket name for the gcs backend
    pub bucket: String,
    /// Lifetime of presigned URLs in seconds
    pub presign_ttl_secs: u64,
    /// HMAC key for local presigned URLs
    pub signing_secret: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            root: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("report-pipeline")
                .join("bucket"),
            bucket: String::new(),
            presign_ttl_secs: 3600,
            signing_secret: "change-me".to_string(),
        }
    }
}

/// Airflow REST API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Base URL of the Airflow stable REST API
    pub base_url: String,
    /// DAG that converts a raw PDF with the layout parser
    pub dag_id: String,
    pub username: String,
    pub password: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            base_url: "http://airflow-webserver:8080/api/v1".to_string(),
            dag_id: "dag_pdf_parser_docling".to_string(),
            username: "airflow".to_string(),
            password: "airflow".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Converter configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ConversionConfig {
    pub layout: LayoutParserConfig,
    pub model: ModelParserConfig,
}

/// Layout-aware local parser options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutParserConfig {
    /// OCR for image-only pages (not supported; must stay off)
    pub do_ocr: bool,
    /// Detect column-aligned tables and emit markdown tables
    pub do_table_structure: bool,
    /// Embed picture bytes instead of placeholders (not supported; must stay off)
    pub generate_picture_images: bool,
    /// Extraction timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LayoutParserConfig {
    fn default() -> Self {
        Self {
            do_ocr: false,
            do_table_structure: true,
            generate_picture_images: false,
            timeout_secs: 60,
        }
    }
}

/// Hosted OCR model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelParserConfig {
    pub base_url: String,
    pub model: String,
    /// API key; the model parser is only registered when set
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ModelParserConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.mistral.ai/v1".to_string(),
            model: "mistral-ocr-latest".to_string(),
            api_key: None,
            timeout_secs: 300,
        }
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Target chunk size in characters (recursive strategy)
    pub chunk_size: usize,
    /// Overlap between chunks in characters (recursive strategy)
    pub chunk_overlap: usize,
    /// Neighbour distance percentile that starts a new semantic chunk
    pub semantic_breakpoint_percentile: f32,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            semantic_breakpoint_percentile: 95.0,
        }
    }
}

/// Embedding provider selection
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Feature hashing, no external service
    #[default]
    Hashing,
    /// Ollama embeddings endpoint
    Ollama,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingBackend,
    /// Embedding dimensions (768 for nomic-embed-text)
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingBackend::Hashing,
            dimensions: 768,
        }
    }
}

/// LLM (Ollama) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Ollama base URL
    pub base_url: String,
    /// Embedding model name
    pub embed_model: String,
    /// Generation model name
    pub generate_model: String,
    /// Temperature for generation
    pub temperature: f32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of retries for failed requests
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            embed_model: "nomic-embed-text".to_string(),
            generate_model: "llama3.2:3b".to_string(),
            temperature: 0.2,
            timeout_secs: 120,
            max_retries: 2,
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Chunks handed to the model when answering a question
    pub top_k: usize,
    /// Chunks handed to the model when summarizing a report
    pub summary_chunks: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            summary_chunks: 20,
        }
    }
}

/// Remote vector stores; `manual` is always available
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct VectorStoresConfig {
    pub pinecone: Option<PineconeConfig>,
    pub chroma: Option<ChromaConfig>,
}

/// Pinecone data-plane configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PineconeConfig {
    pub api_key: String,
    /// Index host, e.g. "reports-abc123.svc.us-east-1.pinecone.io"
    pub index_host: String,
    #[serde(default = "default_store_timeout")]
    pub timeout_secs: u64,
}

impl PineconeConfig {
    pub fn new(api_key: String, index_host: String) -> Self {
        Self {
            api_key,
            index_host,
            timeout_secs: default_store_timeout(),
        }
    }
}

/// ChromaDB server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChromaConfig {
    pub base_url: String,
    #[serde(default = "default_chroma_collection")]
    pub collection: String,
    #[serde(default = "default_store_timeout")]
    pub timeout_secs: u64,
}

impl Default for ChromaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            collection: default_chroma_collection(),
            timeout_secs: default_store_timeout(),
        }
    }
}

fn default_store_timeout() -> u64 {
    60
}

fn default_chroma_collection() -> String {
    "financial_reports".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.storage.presign_ttl_secs, 3600);
        assert_eq!(config.workflow.dag_id, "dag_pdf_parser_docling");
        assert!(!config.conversion.layout.do_ocr);
        assert!(config.conversion.layout.do_table_structure);
    }

    #[test]
    fn test_partial_toml() {
        let config = PipelineConfig::from_toml(
            r#"
            [storage]
            root = "/tmp/bucket"
            presign_ttl_secs = 600

            [chunking]
            chunk_size = 500
            chunk_overlap = 50

            [vector_stores.chroma]
            base_url = "http://chroma:8000"
            "#,
        )
        .unwrap();

        assert_eq!(config.storage.root, PathBuf::from("/tmp/bucket"));
        assert_eq!(config.storage.presign_ttl_secs, 600);
        assert_eq!(config.chunking.chunk_size, 500);
        assert_eq!(config.server.port, 8000);
        let chroma = config.vector_stores.chroma.unwrap();
        assert_eq!(chroma.collection, "financial_reports");
        assert!(config.vector_stores.pinecone.is_none());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_size() {
        let mut config = PipelineConfig::default();
        config.chunking.chunk_overlap = config.chunking.chunk_size;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
