//! Single `IntoResponse` mapping from `DispatchError` to the status/
//! `ok:false` conventions of §7, so no handler repeats this logic.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use dispatch_core::error::{DispatchError, SettlementError, WalletError};
use serde_json::json;

pub struct ApiError(pub DispatchError);

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        ApiError(err)
    }
}

impl From<WalletError> for ApiError {
    fn from(err: WalletError) -> Self {
        ApiError(DispatchError::Wallet(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            DispatchError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            DispatchError::TaskNotFound(id) => (StatusCode::NOT_FOUND, format!("task not found: {id}")),
            DispatchError::WorkerNotRegistered { task_id, worker_id } => (
                StatusCode::NOT_FOUND,
                format!("worker {worker_id} is not registered for task {task_id}"),
            ),
            DispatchError::Planner(err) => (StatusCode::CONFLICT, err.to_string()),
            DispatchError::Wallet(WalletError::SandboxDisabled) => (StatusCode::FORBIDDEN, self.0.to_string()),
            DispatchError::Wallet(WalletError::InvalidAmount) => (StatusCode::BAD_REQUEST, self.0.to_string()),
            DispatchError::Wallet(WalletError::InsufficientBalance { .. }) => (StatusCode::BAD_REQUEST, self.0.to_string()),
            DispatchError::Wallet(WalletError::UserNotFound(_)) => (StatusCode::NOT_FOUND, self.0.to_string()),
            DispatchError::Settlement(SettlementError::CustomerNotFound(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.0.to_string())
            }
            DispatchError::Settlement(SettlementError::Wallet(_)) => (StatusCode::INTERNAL_SERVER_ERROR, self.0.to_string()),
            DispatchError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };
        (status, Json(json!({ "ok": false, "message": message }))).into_response()
    }
}
