//! Generation run handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use reelgen_models::{GenerationIntent, RunId, RunStatus};
use serde::Serialize;
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// Response for an accepted generate request.
#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub run_id: RunId,
    pub status_url: String,
}

fn parse_run_id(raw: &str) -> ApiResult<RunId> {
    raw.parse()
        .map_err(|_| ApiError::bad_request("Invalid run ID format"))
}

/// Start a generation run.
///
/// Returns:
/// - 202: Run accepted, poll `status_url`
/// - 400: Body is not a valid intent, or the intent failed validation
pub async fn generate(
    State(state): State<AppState>,
    payload: Result<Json<GenerationIntent>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<GenerateResponse>)> {
    let Json(intent) = payload.map_err(|rejection| {
        let err = ApiError::from(rejection);
        metrics::record_run_rejected(err.code().unwrap_or("invalid_body"));
        err
    })?;
    let run_id = state.registry.submit(intent).map_err(|e| {
        let err = ApiError::from(e);
        metrics::record_run_rejected(err.code().unwrap_or("invalid_intent"));
        err
    })?;
    metrics::record_run_submitted();
    info!(run_id = %run_id, "Generation accepted");

    Ok((
        StatusCode::ACCEPTED,
        Json(GenerateResponse {
            run_id,
            status_url: format!("/api/generate/{}", run_id),
        }),
    ))
}

/// Current status of a run.
///
/// Returns:
/// - 200: Run status
/// - 400: Malformed run ID
/// - 404: Unknown or expired run
pub async fn get_run_status(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> ApiResult<Json<RunStatus>> {
    let run_id = parse_run_id(&run_id)?;
    state
        .registry
        .status(&run_id)
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Run not found"))
}

/// Request cancellation of a run. Finished runs are returned unchanged.
pub async fn cancel_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> ApiResult<Json<RunStatus>> {
    let run_id = parse_run_id(&run_id)?;
    state
        .registry
        .cancel(&run_id)
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Run not found"))
}
