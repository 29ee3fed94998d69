//! Engine metrics handler.

use axum::Json;
use axum::extract::State;

use beacon_realtime::engine::EngineStats;

use crate::error::ApiError;
use crate::state::AppState;

/// GET /metrics
pub async fn metrics(State(state): State<AppState>) -> Result<Json<EngineStats>, ApiError> {
    Ok(Json(state.engine.stats().await?))
}
