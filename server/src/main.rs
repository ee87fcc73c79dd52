//! Thin binary entry point: boots tracing/config, builds the router defined
//! in `lib.rs`, and serves it. See `lib.rs` for the HTTP projection itself.

use std::time::Duration;

use dispatch_core::{DispatchConfig, DispatchService};
use dispatch_server::{build_router, AppState};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "dispatch_server=info,dispatch_core=info".into()))
        .init();

    let base = if std::env::var("APP_ENV").map(|v| v == "production").unwrap_or(false) {
        DispatchConfig::production()
    } else {
        DispatchConfig::default()
    };
    let config = DispatchConfig::from_env(base);
    let state = AppState::new(DispatchService::new(config));

    tokio::spawn(spawn_heartbeat_sweeper(state.clone()));

    let app = build_router(state);

    let port: u16 = std::env::var("PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(8080);
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await.expect("bind listener");
    tracing::info!(%addr, "dispatch-server listening");
    axum::serve(listener, app).await.expect("server error");
}

/// Periodic heartbeat-table sweep (§1.2 ADDED): not required for
/// correctness (sweeps also happen lazily on every `heartbeat()` call) but
/// keeps memory bounded on a worker pool that stops reconnecting entirely.
async fn spawn_heartbeat_sweeper(state: AppState) {
    let mut interval = tokio::time::interval(Duration::from_secs(60));
    loop {
        interval.tick().await;
        state.service.store().heartbeats.sweep();
    }
}
