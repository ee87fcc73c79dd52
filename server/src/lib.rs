//! `dispatch-server` — the axum HTTP projection of `dispatch_core` (C8, §4.8).
//!
//! Thin by design: every handler extracts the session, calls exactly one
//! `DispatchService` method, and serializes the typed result, the way §6's
//! "crate boundary" note describes. Split into a library target (this file)
//! plus a thin `main.rs` binary so router-level integration tests
//! (`tests/*.rs`, using `tower::ServiceExt::oneshot`) can build the same
//! `Router` the binary serves, per SPEC_FULL.md's test-tooling section.

pub mod error;
pub mod routes;
pub mod session;
pub mod state;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

pub use state::AppState;

pub const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/me", get(routes::me::me))
        .route("/api/wallet/deposit", post(routes::wallet::deposit))
        .route("/api/wallet/withdraw", post(routes::wallet::withdraw))
        .route("/api/stripe/create-checkout-session", post(routes::wallet::create_checkout_session))
        .route("/api/stripe/webhook", post(routes::wallet::webhook))
        .route("/api/tasks", post(routes::tasks::create_task).get(routes::tasks::list_tasks))
        .route("/api/tasks/:id/claim", post(routes::tasks::claim))
        .route("/api/tasks/:id/drop", post(routes::tasks::drop_task))
        .route("/api/tasks/:id/revoke", post(routes::tasks::revoke))
        .route("/api/tasks/:id/reinvoke", post(routes::tasks::reinvoke))
        .route("/api/tasks/:id", delete(routes::tasks::delete_task))
        .route("/api/tasks/:id/results", get(routes::tasks::results))
        .route("/api/worker/next-chunk", post(routes::worker::next_chunk))
        .route("/api/worker/record-progress", post(routes::worker::record_progress))
        .route("/api/worker/record-chunk", post(routes::worker::record_chunk))
        .route("/api/worker/heartbeat", post(routes::worker::heartbeat))
        .route("/api/worker/online/:id", get(routes::worker::online))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
