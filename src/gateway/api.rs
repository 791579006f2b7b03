//! Handlers for the health and status endpoints.

use axum::{
    extract::State,
    response::{IntoResponse, Json},
};
use chrono::Utc;

use super::AppState;

/// GET /health — liveness probe with uptime
pub async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "uptime_seconds": state.started_at.elapsed().as_secs(),
    }))
}

/// GET /status — relay overview with the live session count
pub async fn handle_status(State(state): State<AppState>) -> impl IntoResponse {
    let active_sessions = match state.store.count().await {
        Ok(count) => count,
        Err(e) => {
            tracing::warn!(error = %e, "session count unavailable");
            0
        }
    };

    Json(serde_json::json!({
        "status": "running",
        "agent": state.agent_name,
        "active_sessions": active_sessions,
        "telegram": { "active": true },
    }))
}
