//! Wallet credit and balance lookup.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::Utc;
use domain::events::{PaymentEvent, WalletCreditedData};
use serde::Deserialize;

use crate::AppState;
use crate::error::ApiError;

use super::decode_json;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreditRequest {
    pub user_id: String,
    pub amount: i64,
}

/// POST /wallet/credit — add funds to a wallet.
pub async fn credit(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let request: CreditRequest = decode_json(&body)?;

    state.wallets.credit(&request.user_id, request.amount).await?;

    let credited = PaymentEvent::WalletCredited(WalletCreditedData {
        user_id: request.user_id.clone(),
        amount: request.amount,
        at: Utc::now(),
    });
    if let Err(error) = state.journal.append(&request.user_id, &credited) {
        tracing::warn!(user_id = request.user_id, %error, "journal append failed");
    }
    state.bus.publish(&state.ctx, credited).await;

    Ok(StatusCode::NO_CONTENT)
}

/// GET /wallet/{user_id} — current balance.
pub async fn balance(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if user_id.is_empty() {
        return Err(ApiError::BadRequest("missing user_id".to_string()));
    }

    if let Some(view) = state.projector.get_wallet(&user_id).await {
        return Ok(Json(serde_json::json!({
            "user_id": user_id,
            "balance": view.balance,
        })));
    }

    let balance = state.wallets.balance(&user_id).await?;
    Ok(Json(serde_json::json!({
        "user_id": user_id,
        "balance": balance,
    })))
}
