//! PDF to markdown conversion
//!
//! Two interchangeable converters sit behind [`MarkdownConverter`]:
//! - `LayoutParser` (`layout`): local text extraction with heading and table detection
//! - `ModelParser` (`mistral`): hosted OCR model
//!
//! [`ConversionService`] reads the raw PDF from the object store, converts it
//! and writes the markdown under the parser's key, overwriting earlier runs.

pub mod layout;
pub mod markdown;
pub mod model;

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ConversionConfig;
use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::storage::ObjectStore;
use crate::types::api::ConversionResult;
use crate::types::ReportPeriod;

pub use layout::LayoutParser;
pub use markdown::IMAGE_PLACEHOLDER;
pub use model::ModelParser;

/// Converts a report PDF into markdown
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarkdownConverter: Send + Sync {
    /// Name clients select the converter by
    fn name(&self) -> &'static str;

    /// Prefix of the markdown key, `{prefix}_markdown/...`
    fn storage_prefix(&self) -> &'static str;

    /// Runs as an orchestrator job (`POST /api/pipeline/trigger`) rather than in-process
    fn orchestrated(&self) -> bool {
        false
    }

    /// Convert the whole document; any failure aborts the run
    async fn convert(&self, pdf: &[u8], period: &ReportPeriod) -> Result<String>;
}

/// Converter registry keyed by parser name
pub type ConverterRegistry = Registry<dyn MarkdownConverter>;

/// Register every converter the configuration allows
///
/// The model parser is only available when an API key is configured.
pub fn build_converters(config: &ConversionConfig) -> Result<ConverterRegistry> {
    let mut registry: ConverterRegistry = Registry::new("parser");

    let layout = LayoutParser::new(config.layout.clone())?;
    registry.alias(layout.storage_prefix(), layout.name());
    registry.register(layout.name(), Arc::new(layout));

    if config.model.api_key.is_some() {
        let model = ModelParser::new(config.model.clone())?;
        registry.register(model.name(), Arc::new(model));
    } else {
        tracing::info!("MISTRAL_API_KEY not set, model parser disabled");
    }

    Ok(registry)
}

/// Where the PDF to convert comes from
#[derive(Debug, Clone)]
pub enum PdfSource {
    Bytes(Vec<u8>),
    Path(PathBuf),
}

impl PdfSource {
    pub async fn read(self) -> Result<Vec<u8>> {
        match self {
            Self::Bytes(data) => Ok(data),
            Self::Path(path) => tokio::fs::read(&path).await.map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::not_found(format!("PDF not found at {}", path.display()))
                } else {
                    e.into()
                }
            }),
        }
    }
}

/// Runs a converter against the object store
pub struct ConversionService {
    store: Arc<dyn ObjectStore>,
    presign_ttl: Duration,
}

impl ConversionService {
    pub fn new(store: Arc<dyn ObjectStore>, presign_ttl: Duration) -> Self {
        Self { store, presign_ttl }
    }

    /// Convert the stored raw PDF of `period`
    pub async fn convert(
        &self,
        converter: &dyn MarkdownConverter,
        period: &ReportPeriod,
    ) -> Result<ConversionResult> {
        let key = period.raw_pdf_key();
        if !self.store.exists(&key).await? {
            return Err(Error::not_found(format!("PDF not found for {}", period)));
        }
        let pdf = self.store.get(&key).await?;
        self.convert_source(converter, PdfSource::Bytes(pdf), period)
            .await
    }

    /// Convert a PDF from any source and store the markdown for `period`
    pub async fn convert_source(
        &self,
        converter: &dyn MarkdownConverter,
        source: PdfSource,
        period: &ReportPeriod,
    ) -> Result<ConversionResult> {
        let pdf = source.read().await?;
        let markdown = converter.convert(&pdf, period).await?;

        let markdown_key = period.markdown_key(converter.storage_prefix());
        self.store.put(markdown.into_bytes(), &markdown_key).await?;
        let preview_url = self.store.presign(&markdown_key, self.presign_ttl).await?;

        tracing::info!("Converted {} with {} -> {}", period, converter.name(), markdown_key);

        Ok(ConversionResult {
            markdown_key,
            preview_url,
        })
    }
}
