//! Hosted OCR model parser (Mistral OCR)

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::markdown::replace_images;
use super::MarkdownConverter;
use crate::config::ModelParserConfig;
use crate::error::{Error, Result};
use crate::types::ReportPeriod;

const SERVICE: &str = "Mistral OCR";

#[derive(Serialize)]
struct OcrRequest<'a> {
    model: &'a str,
    document: OcrDocument,
    include_image_base64: bool,
}

#[derive(Serialize)]
struct OcrDocument {
    #[serde(rename = "type")]
    kind: &'static str,
    document_url: String,
}

#[derive(Debug, Deserialize)]
pub struct OcrResponse {
    pub pages: Vec<OcrPage>,
}

#[derive(Debug, Deserialize)]
pub struct OcrPage {
    pub index: u32,
    pub markdown: String,
}

impl OcrResponse {
    /// Join page markdown in page order, images replaced by the placeholder
    pub fn into_markdown(mut self) -> String {
        self.pages.sort_by_key(|page| page.index);
        let joined = self
            .pages
            .iter()
            .map(|page| page.markdown.trim())
            .filter(|page| !page.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");
        let mut markdown = replace_images(&joined);
        markdown.push('\n');
        markdown
    }
}

/// Sends the whole PDF to a hosted OCR model and keeps its markdown
pub struct ModelParser {
    client: Client,
    config: ModelParserConfig,
    api_key: String,
}

impl ModelParser {
    pub fn new(config: ModelParserConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| Error::Config("conversion.model.api_key is not set".to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            api_key,
        })
    }
}

#[async_trait]
impl MarkdownConverter for ModelParser {
    fn name(&self) -> &'static str {
        "mistral"
    }

    fn storage_prefix(&self) -> &'static str {
        "mistral"
    }

    async fn convert(&self, pdf: &[u8], period: &ReportPeriod) -> Result<String> {
        let url = format!("{}/ocr", self.config.base_url.trim_end_matches('/'));
        let encoded = base64::engine::general_purpose::STANDARD.encode(pdf);

        let request = OcrRequest {
            model: &self.config.model,
            document: OcrDocument {
                kind: "document_url",
                document_url: format!("data:application/pdf;base64,{}", encoded),
            },
            include_image_base64: false,
        };

        tracing::info!("Sending {} ({} bytes) to {}", period, pdf.len(), self.config.model);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::upstream(SERVICE, format!("request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!("OCR request for {} failed: HTTP {}", period, status);
            return Err(Error::upstream(SERVICE, format!("HTTP {} - {}", status, body)));
        }

        let ocr: OcrResponse = response
            .json()
            .await
            .map_err(|e| Error::upstream(SERVICE, format!("invalid response: {}", e)))?;

        let pages = ocr.pages.len();
        let markdown = ocr.into_markdown();
        tracing::info!("OCR converted {}: {} pages, {} chars", period, pages, markdown.len());
        Ok(markdown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_api_key() {
        assert!(matches!(
            ModelParser::new(ModelParserConfig::default()),
            Err(Error::Config(_))
        ));

        let config = ModelParserConfig {
            api_key: Some("secret".to_string()),
            ..Default::default()
        };
        assert!(ModelParser::new(config).is_ok());
    }

    #[test]
    fn test_response_pages_are_ordered_and_images_replaced() {
        let raw = r###"{
            "pages": [
                {"index": 1, "markdown": "## Outlook\n\n![img-1.jpeg](img-1.jpeg)", "images": []},
                {"index": 0, "markdown": "# NVIDIA Q1 FY2025\n\nRevenue was $26.0 billion."}
            ],
            "model": "mistral-ocr-latest"
        }"###;
        let response: OcrResponse = serde_json::from_str(raw).unwrap();

        assert_eq!(
            response.into_markdown(),
            "# NVIDIA Q1 FY2025\n\nRevenue was $26.0 billion.\n\n## Outlook\n\n<!-- image -->\n"
        );
    }
}
