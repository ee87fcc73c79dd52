//! `GET /api/me` (§6).

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::session::Session;
use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProfileResponse {
    user: dispatch_core::models::User,
    wallet_transactions: Vec<dispatch_core::models::WalletTransaction>,
    wallet_transactions_total: usize,
}

pub async fn me(State(state): State<AppState>, Session(session): Session) -> Json<ProfileResponse> {
    let profile = state.service.profile(&session).await;
    Json(ProfileResponse {
        user: profile.user,
        wallet_transactions: profile.wallet_transactions,
        wallet_transactions_total: profile.wallet_transactions_total,
    })
}
