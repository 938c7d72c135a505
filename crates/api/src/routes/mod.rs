//! HTTP route handlers.

pub mod health;
pub mod metrics;
pub mod payments;
pub mod wallet;

use axum::body::Bytes;
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// Strict request decoding: exactly one JSON object, unknown fields
/// rejected by the target type, anything else a 400. The 1 MiB body cap
/// is enforced by the router's body-limit layer.
pub(crate) fn decode_json<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|_| ApiError::BadRequest("invalid json".to_string()))
}
