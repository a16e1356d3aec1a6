//! Health endpoints. Degradation is reported in the body; the status code is always 200.

use crate::{health::HealthResponse, AppState};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use tracing::info;

/// Sequential probes and a single metrics pass; meant for frequent polling.
pub async fn handle_fast_health(State(state): State<AppState>) -> impl IntoResponse {
    info!("GET /api/system/health/fast - Running fast health checks");

    let report = state.health.fast_report().await;
    (StatusCode::OK, Json(HealthResponse::from(report)))
}

/// Parallel probes under the configured budgets; may return partial data.
pub async fn handle_full_health(State(state): State<AppState>) -> impl IntoResponse {
    info!("GET /api/system/health - Running comprehensive health checks");

    let report = state.health.full_report().await;
    (StatusCode::OK, Json(HealthResponse::from(report)))
}
