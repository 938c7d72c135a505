//! Payment creation and lookup.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::Utc;
use domain::CreateRequest;
use domain::events::{PaymentCreatedData, PaymentEvent, PaymentInitializedData};
use serde::Deserialize;

use crate::AppState;
use crate::error::ApiError;

use super::decode_json;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePaymentRequest {
    pub payment_id: String,
    pub user_id: String,
    pub amount: i64,
    pub service: String,
}

/// POST /payments — accept a payment for asynchronous processing.
///
/// Persists the aggregate, then appends and publishes `payment.created`
/// and `payment.initialized`; the saga takes over from there. Returns 202
/// with the initial status.
pub async fn create(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let request: CreatePaymentRequest = decode_json(&body)?;

    let report = state.health.check().await;
    if !report.ok {
        tracing::warn!(checks = ?report.checks, "payment refused, service unavailable");
        return Err(ApiError::Unavailable(report));
    }

    let payment = state
        .payments
        .initialize(CreateRequest {
            payment_id: request.payment_id,
            user_id: request.user_id,
            amount: request.amount,
            service: request.service,
        })
        .await?;

    let now = Utc::now();
    let created = PaymentEvent::PaymentCreated(PaymentCreatedData {
        payment_id: payment.payment_id.clone(),
        user_id: payment.user_id.clone(),
        amount: payment.amount,
        service: payment.service.clone(),
        at: now,
    });
    if let Err(error) = state.journal.append(&payment.payment_id, &created) {
        tracing::warn!(payment_id = payment.payment_id, %error, "journal append failed");
    }
    state.bus.publish(&state.ctx, created).await;

    let initialized = PaymentEvent::PaymentInitialized(PaymentInitializedData {
        payment_id: payment.payment_id.clone(),
        user_id: payment.user_id.clone(),
        amount: payment.amount,
        service: payment.service.clone(),
        at: now,
    });
    if let Err(error) = state.journal.append(&payment.payment_id, &initialized) {
        tracing::warn!(payment_id = payment.payment_id, %error, "journal append failed");
    }
    state.bus.publish(&state.ctx, initialized).await;

    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "payment_id": payment.payment_id,
            "status": payment.status,
        })),
    ))
}

/// GET /payments/{id} — current view of a payment.
///
/// Served from the read model when it has the payment, falling back to
/// the service for aggregates the projector has not yet seen.
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(payment_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if payment_id.is_empty() {
        return Err(ApiError::BadRequest("missing payment_id".to_string()));
    }

    if let Some(view) = state.projector.get_payment(&payment_id).await {
        return Ok(Json(serde_json::json!({
            "payment_id": view.payment_id,
            "user_id": view.user_id,
            "amount": view.amount,
            "service": view.service,
            "status": view.status,
            "reason": view.reason,
            "gateway_id": view.gateway_id,
        })));
    }

    let payment = state.payments.get(&payment_id).await?;
    Ok(Json(serde_json::json!({
        "payment_id": payment.payment_id,
        "user_id": payment.user_id,
        "amount": payment.amount,
        "service": payment.service,
        "status": payment.status,
        "reason": payment.reason,
        "gateway_id": payment.gateway_id,
    })))
}
