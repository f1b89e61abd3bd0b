//! Layout-aware local parser
//!
//! Text comes from `pdf-extract` page by page, image counts from `lopdf`.
//! Extraction runs on the blocking pool under the configured timeout.

use async_trait::async_trait;
use std::time::Duration;

use super::markdown::{render_document, PageText};
use super::MarkdownConverter;
use crate::config::LayoutParserConfig;
use crate::error::{Error, Result};
use crate::types::ReportPeriod;

const SERVICE: &str = "Layout parser";

/// Local PDF to markdown converter; output lives under `docling_markdown/`
pub struct LayoutParser {
    config: LayoutParserConfig,
}

impl LayoutParser {
    pub fn new(config: LayoutParserConfig) -> Result<Self> {
        if config.do_ocr {
            return Err(Error::Config(
                "conversion.layout.do_ocr is not supported; image-only pages must go through the model parser".to_string(),
            ));
        }
        if config.generate_picture_images {
            return Err(Error::Config(
                "conversion.layout.generate_picture_images is not supported; images are emitted as placeholders".to_string(),
            ));
        }
        Ok(Self { config })
    }

    /// Extract text and image counts for every page
    pub fn extract_pages(pdf: &[u8]) -> Result<Vec<PageText>> {
        let texts = pdf_extract::extract_text_from_mem_by_pages(pdf)
            .map_err(|e| Error::upstream(SERVICE, format!("text extraction: {}", e)))?;

        let images = Self::count_images(pdf);
        Ok(texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| PageText {
                text,
                images: images.get(i).copied().unwrap_or(0),
            })
            .collect())
    }

    /// Images per page in page order; unreadable pages count as none
    fn count_images(pdf: &[u8]) -> Vec<usize> {
        let doc = match lopdf::Document::load_mem(pdf) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::debug!("lopdf could not load document for image scan: {}", e);
                return Vec::new();
            }
        };

        doc.get_pages()
            .into_values()
            .map(|page_id| {
                doc.get_page_images(page_id)
                    .map(|images| images.len())
                    .unwrap_or(0)
            })
            .collect()
    }
}

#[async_trait]
impl MarkdownConverter for LayoutParser {
    fn name(&self) -> &'static str {
        "layout"
    }

    fn storage_prefix(&self) -> &'static str {
        "docling"
    }

    fn orchestrated(&self) -> bool {
        true
    }

    async fn convert(&self, pdf: &[u8], period: &ReportPeriod) -> Result<String> {
        let data = pdf.to_vec();
        let detect_tables = self.config.do_table_structure;
        let timeout = Duration::from_secs(self.config.timeout_secs);

        tracing::info!("Layout parsing {} ({} bytes)", period, data.len());

        let task = tokio::task::spawn_blocking(move || {
            let pages = Self::extract_pages(&data)?;
            Ok::<_, Error>((pages.len(), render_document(&pages, detect_tables)))
        });

        let (pages, markdown) = match tokio::time::timeout(timeout, task).await {
            Ok(joined) => joined
                .map_err(|e| Error::internal(format!("PDF extraction task failed: {}", e)))??,
            Err(_) => {
                tracing::error!("PDF extraction for {} timed out after {:?}", period, timeout);
                return Err(Error::upstream(
                    SERVICE,
                    format!("extraction timed out after {}s", timeout.as_secs()),
                ));
            }
        };

        if markdown.trim().is_empty() {
            return Err(Error::upstream(
                SERVICE,
                "no text could be extracted; the PDF may be image-only",
            ));
        }

        tracing::info!("Layout parsed {}: {} pages, {} chars", period, pages, markdown.len());
        Ok(markdown)
    }
}
