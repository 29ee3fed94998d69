//! Application state shared across all handlers.

use std::sync::Arc;

use beacon_core::config::AppConfig;
use beacon_database::DatabasePool;
use beacon_realtime::RealtimeEngine;
use beacon_realtime::connection::TokenAuthenticator;

/// Application state containing all shared dependencies.
///
/// Passed to every Axum handler via `State<AppState>`. All fields are
/// cheaply cloneable.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// PostgreSQL pool, used here for reachability checks.
    pub db: DatabasePool,
    /// The realtime engine.
    pub engine: Arc<RealtimeEngine>,
    /// Handshake token validator.
    pub authenticator: Arc<TokenAuthenticator>,
}
