//! Health check handler.

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// Health summary returned by `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `"ok"` when every dependency responds, `"degraded"` otherwise.
    pub status: String,
    /// Database reachability: `"connected"` or `"unreachable"`.
    pub database: String,
    /// Fan-out broker reachability.
    pub broker: String,
    /// Open WebSocket connections on this instance.
    pub connections: usize,
    /// Seconds since the engine started.
    pub uptime: i64,
}

/// GET /health
///
/// Always answers 200; dependency state is reported in the body.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match state.db.health_check().await {
        Ok(true) => "connected",
        _ => "unreachable",
    };
    let broker = match state.engine.bridge().health_check().await {
        Ok(true) => "connected",
        _ => "unreachable",
    };
    let status = if database == "connected" && broker == "connected" {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: status.to_string(),
        database: database.to_string(),
        broker: broker.to_string(),
        connections: state.engine.connection_count(),
        uptime: state.engine.uptime_seconds(),
    })
}
