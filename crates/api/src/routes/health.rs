//! Readiness endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use crate::AppState;
use crate::health::HealthReport;

/// GET /health — aggregated probe report; 503 when any probe fails.
pub async fn check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<HealthReport>) {
    let report = state.health.check().await;
    let status = if report.ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}
