//! Wallet and Stripe-delegated endpoints (§6). `/api/stripe/*` are stubs:
//! the actual Stripe integration is out of scope (§1); `create-checkout-session`
//! answers 501 and `webhook` applies a deposit directly, matching what a real
//! webhook handler would do once Stripe confirms payment.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::session::Session;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct AmountBody {
    pub amount: Decimal,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WalletOpResponse {
    user: dispatch_core::models::User,
    transaction: dispatch_core::models::WalletTransaction,
}

pub async fn deposit(
    State(state): State<AppState>,
    Session(session): Session,
    Json(body): Json<AmountBody>,
) -> Result<Json<WalletOpResponse>, ApiError> {
    let (user, transaction) = state.service.deposit(&session, body.amount).await?;
    Ok(Json(WalletOpResponse { user, transaction }))
}

pub async fn withdraw(
    State(state): State<AppState>,
    Session(session): Session,
    Json(body): Json<AmountBody>,
) -> Result<Json<WalletOpResponse>, ApiError> {
    let (user, transaction) = state.service.withdraw(&session, body.amount).await?;
    Ok(Json(WalletOpResponse { user, transaction }))
}

pub async fn create_checkout_session() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_IMPLEMENTED,
        Json(serde_json::json!({ "message": "checkout integration is not part of this deployment" })),
    )
}

#[derive(Deserialize)]
pub struct StripeWebhookBody {
    #[serde(default)]
    pub session_id: Option<String>,
    pub user_id: String,
    pub amount: Decimal,
}

pub async fn webhook(
    State(state): State<AppState>,
    Json(body): Json<StripeWebhookBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let reason = body.session_id.unwrap_or_else(|| "stripe-checkout".to_string());
    state.service.apply_external_deposit(&body.user_id, body.amount, &reason).await?;
    Ok(Json(serde_json::json!({ "received": true })))
}
