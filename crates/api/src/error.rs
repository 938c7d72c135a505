//! API error type with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use common::{CoreError, ErrorKind};

use crate::health::HealthReport;

/// API-level error mapped to an HTTP response.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed or invalid request.
    BadRequest(String),
    /// Resource does not exist.
    NotFound(String),
    /// Readiness probes failed; the create path refuses work.
    Unavailable(HealthReport),
    /// Anything else.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                axum::Json(serde_json::json!({ "error": message })),
            )
                .into_response(),
            ApiError::NotFound(message) => (
                StatusCode::NOT_FOUND,
                axum::Json(serde_json::json!({ "error": message })),
            )
                .into_response(),
            ApiError::Unavailable(report) => (
                StatusCode::SERVICE_UNAVAILABLE,
                axum::Json(serde_json::json!({
                    "status": "down",
                    "checks": report.checks,
                })),
            )
                .into_response(),
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    axum::Json(serde_json::json!({ "error": "internal error" })),
                )
                    .into_response()
            }
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err.kind() {
            ErrorKind::Invalid => ApiError::BadRequest(err.to_string()),
            ErrorKind::NotFound => ApiError::NotFound(err.to_string()),
            ErrorKind::Conflict | ErrorKind::Internal => ApiError::Internal(err.to_string()),
        }
    }
}
