//! Report discovery and artifact links

use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::server::extract::{ApiPath, ApiQuery};
use crate::server::state::AppState;
use crate::types::api::{OptionsResponse, PdfUrlResponse, QuartersResponse, YearsResponse};
use crate::types::{ChunkStrategy, ReportPeriod, RAW_PDF_PREFIX};

/// GET /api/years - years with raw PDFs, newest first
pub async fn list_years(State(state): State<AppState>) -> Result<Json<YearsResponse>> {
    let prefixes = state.store().list_prefixes(RAW_PDF_PREFIX).await?;
    let years: Vec<String> = prefixes
        .into_iter()
        .rev()
        .filter(|year| ReportPeriod::parse_year(year).is_ok())
        .collect();

    tracing::debug!("Found {} report years", years.len());
    Ok(Json(YearsResponse { years }))
}

/// GET /api/years/:year/quarters - quarters with a PDF, sorted
pub async fn list_quarters(
    State(state): State<AppState>,
    ApiPath(year): ApiPath<String>,
) -> Result<Json<QuartersResponse>> {
    let year = ReportPeriod::parse_year(&year)?;
    let prefix = ReportPeriod::year_prefix(&year);

    let mut quarters: Vec<String> = state
        .store()
        .list_keys(&prefix)
        .await?
        .iter()
        .filter_map(|key| key.strip_prefix(&prefix))
        .filter(|name| !name.contains('/'))
        .filter_map(|name| name.strip_suffix(".pdf"))
        .map(str::to_string)
        .collect();
    quarters.sort();

    Ok(Json(QuartersResponse { quarters }))
}

/// GET /api/reports/:year/:quarter/pdf-url - presigned link to the raw PDF
pub async fn pdf_url(
    State(state): State<AppState>,
    ApiPath((year, quarter)): ApiPath<(String, String)>,
) -> Result<Json<PdfUrlResponse>> {
    let period = ReportPeriod::new(year, quarter)?;
    let key = period.raw_pdf_key();

    if !state.store().exists(&key).await? {
        return Err(Error::not_found("PDF not found"));
    }

    let pdf_url = state.store().presign(&key, state.presign_ttl()).await?;
    Ok(Json(PdfUrlResponse { pdf_url }))
}

/// GET /api/options - names a client can select
pub async fn options(State(state): State<AppState>) -> Json<OptionsResponse> {
    Json(OptionsResponse {
        parsers: state.converters().names(),
        strategies: ChunkStrategy::ALL
            .iter()
            .map(|s| s.as_str().to_string())
            .collect(),
        backends: state.backends().names(),
        orchestrated_parsers: state.converters().names_where(|c| c.orchestrated()),
    })
}

#[derive(Debug, Deserialize)]
pub struct PresignedParams {
    pub expires: i64,
    pub signature: String,
}

/// GET /objects/*key?expires=..&signature=.. - serve a presigned link
pub async fn presigned_object(
    State(state): State<AppState>,
    ApiPath(key): ApiPath<String>,
    ApiQuery(params): ApiQuery<PresignedParams>,
) -> Result<impl IntoResponse> {
    let data = state
        .store()
        .open_presigned(&key, params.expires, &params.signature)
        .await?;

    let content_type = mime_guess::from_path(&key)
        .first_or_octet_stream()
        .to_string();
    Ok(([(header::CONTENT_TYPE, content_type)], data))
}
