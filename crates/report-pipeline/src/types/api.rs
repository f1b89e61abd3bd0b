//! Request and response bodies of the pipeline API

use serde::{Deserialize, Serialize};

use super::chunk::{ChunkSetKey, ChunkStrategy};
use super::period::ReportPeriod;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearsResponse {
    pub years: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuartersResponse {
    pub quarters: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfUrlResponse {
    pub pdf_url: String,
}

/// Names the client can choose from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionsResponse {
    pub parsers: Vec<String>,
    pub strategies: Vec<String>,
    pub backends: Vec<String>,
    /// Parsers whose conversion is submitted to the orchestrator
    #[serde(default)]
    pub orchestrated_parsers: Vec<String>,
}

/// Body of requests scoped to a report period
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodRequest {
    pub year: String,
    pub quarter: String,
}

impl PeriodRequest {
    pub fn period(&self) -> Result<ReportPeriod> {
        ReportPeriod::new(self.year.as_str(), self.quarter.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerResponse {
    pub message: String,
    pub run_id: String,
}

/// Where a converted document landed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub markdown_key: String,
    pub preview_url: String,
}

/// Body of requests scoped to a chunk set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkSetRequest {
    pub year: String,
    pub quarter: String,
    pub parser: String,
    pub strategy: String,
}

impl ChunkSetRequest {
    pub fn key(&self) -> Result<ChunkSetKey> {
        let period = ReportPeriod::new(self.year.as_str(), self.quarter.as_str())?;
        let strategy: ChunkStrategy = self.strategy.parse()?;
        if self.parser.trim().is_empty() {
            return Err(crate::error::Error::validation("Select a parser first"));
        }
        Ok(ChunkSetKey::new(period, self.parser.trim().to_lowercase(), strategy))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunksResponse {
    pub chunks: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub chunks_uploaded: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    pub year: String,
    pub quarter: String,
    pub parser: String,
    pub strategy: String,
    /// Overrides the configured number of supporting chunks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,
}

impl QueryRequest {
    pub fn chunk_set(&self) -> ChunkSetRequest {
        ChunkSetRequest {
            year: self.year.clone(),
            quarter: self.quarter.clone(),
            parser: self.parser.clone(),
            strategy: self.strategy.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    /// Supporting chunk texts, most similar first
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryResponse {
    pub summary: String,
}
