//! HTTP gateway — health and status probes over axum.

pub mod api;

use axum::{routing::get, Router};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

use crate::sessions::SessionStore;

/// Shared state for the gateway handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SessionStore>,
    pub agent_name: String,
    pub started_at: Instant,
}

/// Build the gateway router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(api::handle_health))
        .route("/status", get(api::handle_status))
        .layer(TimeoutLayer::new(Duration::from_secs(10)))
        .layer(RequestBodyLimitLayer::new(64 * 1024))
        .with_state(state)
}

/// Serve the gateway on an already-bound listener. Binding happens in
/// main so a bind failure is fatal at startup.
pub async fn run_gateway(listener: TcpListener, state: AppState) -> anyhow::Result<()> {
    tracing::info!(addr = %listener.local_addr()?, "gateway listening");
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}
