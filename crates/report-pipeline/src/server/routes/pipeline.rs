//! Stage triggers: orchestrated conversion and in-process conversion

use axum::{
    extract::State,
    Json,
};

use crate::error::{Error, Result};
use crate::server::extract::{ApiJson, ApiPath};
use crate::server::state::AppState;
use crate::types::api::{ConversionResult, PeriodRequest, TriggerResponse};

/// POST /api/pipeline/trigger - submit the layout conversion job
///
/// Returns as soon as the orchestrator accepts the run; the markdown appears
/// whenever the run finishes.
pub async fn trigger(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<PeriodRequest>,
) -> Result<Json<TriggerResponse>> {
    let period = request.period()?;
    if !state.store().exists(&period.raw_pdf_key()).await? {
        return Err(Error::not_found(format!("PDF not found for {}", period)));
    }

    let workflow = state.workflow();
    let run = workflow
        .trigger(workflow.conversion_job(), &period.job_params())
        .await?;

    Ok(Json(TriggerResponse {
        message: "DAG triggered successfully".to_string(),
        run_id: run.run_id,
    }))
}

/// POST /api/convert/:parser - convert a raw PDF with the named parser
pub async fn convert(
    State(state): State<AppState>,
    ApiPath(parser): ApiPath<String>,
    ApiJson(request): ApiJson<PeriodRequest>,
) -> Result<Json<ConversionResult>> {
    let period = request.period()?;
    let converter = state.converters().get(&parser)?;

    tracing::info!("Converting {} with {}", period, converter.name());
    let result = state
        .conversion()
        .convert(converter.as_ref(), &period)
        .await?;

    Ok(Json(result))
}
