//! CVA run submission and status endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use cva_pipeline::{PipelineError, RunConfig};
use cva_pricing::PricingService;

use super::AppState;

/// Run submission request body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    /// Calculation date, `YYYY-MM-DD`
    pub calc_date: String,
    /// Items per pricing batch; defaults to the server configuration
    pub batch_size: Option<usize>,
    /// Maximum pricing batches in flight; defaults to the server configuration
    pub fan_out: Option<usize>,
    /// Persist intermediate stage output to the debug sink
    #[serde(default)]
    pub debug: bool,
}

/// Accepted run response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunAccepted {
    /// Job name
    pub name: String,
    /// Run id; keys the published artifacts
    pub run_id: String,
    /// Calculation date the run covers
    pub calc_date: String,
}

/// Rejected run response, carrying the existing run's identity
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRejected {
    /// Human-readable rejection reason
    pub error: String,
    /// Existing run's job name
    pub name: String,
    /// Existing run's id
    pub run_id: String,
    /// Existing run's state
    pub status: String,
}

/// Run status response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStatusResponse {
    /// Calculation date queried
    pub calc_date: String,
    /// Current run state for the date
    pub status: String,
}

/// Build the run routes
pub fn routes<S: PricingService>() -> Router<AppState<S>> {
    Router::new()
        .route("/api/v1/cva/run", post(submit_handler))
        .route("/api/v1/cva/status/:calc_date", get(status_handler))
}

/// POST /api/v1/cva/run - Submit a run for a calculation date
///
/// Returns 202 with the run identity; the pipeline executes in the
/// background and its outcome is visible through the status endpoint. A
/// date with a run still in flight is rejected with 409 and the existing
/// run's identity.
async fn submit_handler<S: PricingService>(
    State(state): State<AppState<S>>,
    Json(request): Json<RunRequest>,
) -> Response {
    let Ok(calc_date) = NaiveDate::parse_from_str(&request.calc_date, "%Y-%m-%d") else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": format!("invalid calculation date: {}", request.calc_date),
            })),
        )
            .into_response();
    };

    let mut config = RunConfig::new(calc_date);
    config.batch_size = request.batch_size.unwrap_or(state.config.batch_size);
    config.fan_out = request.fan_out.unwrap_or(state.config.fan_out);
    config.debug = request.debug;

    match state.pipeline.clone().submit_background(config) {
        Ok(handle) => {
            info!(run = %handle.run_id, "run accepted");
            (
                StatusCode::ACCEPTED,
                Json(RunAccepted {
                    name: handle.name,
                    run_id: handle.run_id,
                    calc_date: handle.calc_date.to_string(),
                }),
            )
                .into_response()
        }
        Err(PipelineError::DuplicateRun(dup)) => (
            StatusCode::CONFLICT,
            Json(RunRejected {
                error: dup.to_string(),
                name: dup.name,
                run_id: dup.run_id,
                status: dup.status.to_string(),
            }),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

/// GET /api/v1/cva/status/{calcDate} - Current run state for a date
async fn status_handler<S: PricingService>(
    State(state): State<AppState<S>>,
    Path(calc_date): Path<String>,
) -> Response {
    let Ok(date) = NaiveDate::parse_from_str(&calc_date, "%Y-%m-%d") else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": format!("invalid calculation date: {calc_date}") })),
        )
            .into_response();
    };

    match state.pipeline.registry().status(date) {
        Some(status) => (
            StatusCode::OK,
            Json(RunStatusResponse {
                calc_date,
                status: status.to_string(),
            }),
        )
            .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("no run for {calc_date}") })),
        )
            .into_response(),
    }
}
