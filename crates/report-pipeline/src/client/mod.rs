//! Client for the pipeline API and the interactive session it drives

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::api::{
    ChunkSetRequest, ChunksResponse, ConversionResult, OptionsResponse, PdfUrlResponse,
    PeriodRequest, QuartersResponse, QueryRequest, QueryResponse, SummaryResponse,
    TriggerResponse, UploadResponse, YearsResponse,
};

const SERVICE: &str = "Pipeline API";

#[derive(Deserialize)]
struct ErrorBody {
    detail: String,
}

/// Typed access to every pipeline endpoint
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .map_err(|e| Error::upstream(SERVICE, format!("GET {}: {}", path, e)))?;
        Self::decode(response).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await
            .map_err(|e| Error::upstream(SERVICE, format!("POST {}: {}", path, e)))?;
        Self::decode(response).await
    }

    /// Map the API's `{"detail": ...}` error bodies back onto error kinds
    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| Error::upstream(SERVICE, format!("invalid response: {}", e)));
        }

        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.detail)
            .unwrap_or(body);

        Err(match status {
            StatusCode::NOT_FOUND => Error::NotFound(detail),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => Error::Validation(detail),
            StatusCode::FORBIDDEN => Error::Forbidden(detail),
            _ => Error::upstream(SERVICE, format!("HTTP {} - {}", status, detail)),
        })
    }

    pub async fn years(&self) -> Result<Vec<String>> {
        Ok(self.get::<YearsResponse>("/api/years").await?.years)
    }

    pub async fn quarters(&self, year: &str) -> Result<Vec<String>> {
        let path = format!("/api/years/{}/quarters", year);
        Ok(self.get::<QuartersResponse>(&path).await?.quarters)
    }

    pub async fn pdf_url(&self, period: &PeriodRequest) -> Result<String> {
        let path = format!("/api/reports/{}/{}/pdf-url", period.year, period.quarter);
        Ok(self.get::<PdfUrlResponse>(&path).await?.pdf_url)
    }

    pub async fn options(&self) -> Result<OptionsResponse> {
        self.get("/api/options").await
    }

    pub async fn trigger(&self, period: &PeriodRequest) -> Result<TriggerResponse> {
        self.post("/api/pipeline/trigger", period).await
    }

    pub async fn convert(&self, parser: &str, period: &PeriodRequest) -> Result<ConversionResult> {
        self.post(&format!("/api/convert/{}", parser), period).await
    }

    pub async fn chunks(&self, request: &ChunkSetRequest) -> Result<Vec<String>> {
        Ok(self
            .post::<_, ChunksResponse>("/api/chunks", request)
            .await?
            .chunks)
    }

    pub async fn upload(&self, backend: &str, request: &ChunkSetRequest) -> Result<usize> {
        let path = format!("/api/index/{}/upload", backend);
        Ok(self
            .post::<_, UploadResponse>(&path, request)
            .await?
            .chunks_uploaded)
    }

    pub async fn query(&self, backend: &str, request: &QueryRequest) -> Result<QueryResponse> {
        self.post(&format!("/api/index/{}/query", backend), request)
            .await
    }

    pub async fn summarize(&self, backend: &str, request: &ChunkSetRequest) -> Result<String> {
        let path = format!("/api/index/{}/summarize", backend);
        Ok(self
            .post::<_, SummaryResponse>(&path, request)
            .await?
            .summary)
    }
}

/// Choices made so far in one interactive session
///
/// Passed explicitly through every step; nothing is kept globally.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub year: Option<String>,
    pub quarter: Option<String>,
    pub parser: Option<String>,
    pub strategy: Option<String>,
    pub backend: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick a year; the quarter belongs to the old year and is cleared
    pub fn select_year(&mut self, year: impl Into<String>) {
        self.year = Some(year.into());
        self.quarter = None;
    }

    pub fn select_quarter(&mut self, quarter: impl Into<String>) {
        self.quarter = Some(quarter.into());
    }

    pub fn select_parser(&mut self, parser: impl Into<String>) {
        self.parser = Some(parser.into());
    }

    pub fn select_strategy(&mut self, strategy: impl Into<String>) {
        self.strategy = Some(strategy.into());
    }

    pub fn select_backend(&mut self, backend: impl Into<String>) {
        self.backend = Some(backend.into());
    }

    fn require<'a>(value: &'a Option<String>, what: &str) -> Result<&'a str> {
        value
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| Error::validation(format!("Select a {} first", what)))
    }

    pub fn require_year(&self) -> Result<&str> {
        Self::require(&self.year, "year")
    }

    pub fn require_parser(&self) -> Result<&str> {
        Self::require(&self.parser, "parser")
    }

    pub fn require_backend(&self) -> Result<&str> {
        Self::require(&self.backend, "backend")
    }

    pub fn period_request(&self) -> Result<PeriodRequest> {
        Ok(PeriodRequest {
            year: self.require_year()?.to_string(),
            quarter: Self::require(&self.quarter, "quarter")?.to_string(),
        })
    }

    pub fn chunk_set_request(&self) -> Result<ChunkSetRequest> {
        let period = self.period_request()?;
        Ok(ChunkSetRequest {
            year: period.year,
            quarter: period.quarter,
            parser: self.require_parser()?.to_string(),
            strategy: Self::require(&self.strategy, "chunking strategy")?.to_string(),
        })
    }

    pub fn query_request(&self, query: impl Into<String>) -> Result<QueryRequest> {
        let chunk_set = self.chunk_set_request()?;
        Ok(QueryRequest {
            query: query.into(),
            year: chunk_set.year,
            quarter: chunk_set.quarter,
            parser: chunk_set.parser,
            strategy: chunk_set.strategy,
            top_k: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode as AxumStatus, routing::get, Json, Router};
    use serde_json::json;

    #[test]
    fn test_session_requires_selections_in_order() {
        let mut session = Session::new();
        assert!(matches!(session.period_request(), Err(Error::Validation(m)) if m == "Select a year first"));

        session.select_year("2024");
        assert!(matches!(session.period_request(), Err(Error::Validation(m)) if m == "Select a quarter first"));

        session.select_quarter("Q1");
        session.select_parser("layout");
        assert!(matches!(
            session.chunk_set_request(),
            Err(Error::Validation(m)) if m == "Select a chunking strategy first"
        ));

        session.select_strategy("markdown");
        let request = session.query_request("What was revenue?").unwrap();
        assert_eq!(request.year, "2024");
        assert_eq!(request.parser, "layout");
        assert!(session.require_backend().is_err());

        session.select_year("2023");
        assert_eq!(session.quarter, None);
    }

    async fn fake_api() -> String {
        let app = Router::new()
            .route("/api/years", get(|| async { Json(json!({"years": ["2024", "2023"]})) }))
            .route(
                "/api/reports/:year/:quarter/pdf-url",
                get(|| async { (AxumStatus::NOT_FOUND, Json(json!({"detail": "PDF not found"}))) }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_success_and_detail_errors() {
        let client = ApiClient::new(fake_api().await, Duration::from_secs(5)).unwrap();
        assert_eq!(client.years().await.unwrap(), vec!["2024", "2023"]);

        let period = PeriodRequest {
            year: "2024".to_string(),
            quarter: "Q3".to_string(),
        };
        match client.pdf_url(&period).await {
            Err(Error::NotFound(detail)) => assert_eq!(detail, "PDF not found"),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
