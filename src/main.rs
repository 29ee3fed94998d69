//! Beacon Server — Realtime Connection and Room Hub
//!
//! Main entry point that wires all crates together and starts the server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};
use uuid::Uuid;

use beacon_core::config::AppConfig;
use beacon_core::error::AppError;
use beacon_database::DatabasePool;
use beacon_database::repositories::{
    ConnectionRepository, EventRepository, PresenceRepository, RoomMemberRepository,
    RoomRepository, TypingRepository,
};
use beacon_realtime::bridge::init_bridge;
use beacon_realtime::connection::TokenAuthenticator;
use beacon_realtime::{EngineStores, RealtimeEngine};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {e}");
        std::process::exit(1);
    }
}

/// Load configuration for the current environment.
fn load_configuration() -> Result<AppConfig, AppError> {
    let env = std::env::var("BEACON_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(&env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting Beacon v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Database connection + migrations ─────────────────
    tracing::info!("Connecting to database...");
    let db = DatabasePool::connect(&config.database).await?;
    beacon_database::migration::run_migrations(db.pool()).await?;

    // ── Step 2: Stores ───────────────────────────────────────────
    let stores = EngineStores {
        connections: Arc::new(ConnectionRepository::new(db.pool().clone())),
        rooms: Arc::new(RoomRepository::new(db.pool().clone())),
        members: Arc::new(RoomMemberRepository::new(db.pool().clone())),
        presence: Arc::new(PresenceRepository::new(db.pool().clone())),
        typing: Arc::new(TypingRepository::new(db.pool().clone())),
        events: Arc::new(EventRepository::new(db.pool().clone())),
    };

    // ── Step 3: Fan-out bridge ───────────────────────────────────
    tracing::info!("Initializing broker (provider: {})...", config.broker.provider);
    let bridge = init_bridge(&config.broker).await?;

    // ── Step 4: Realtime engine ──────────────────────────────────
    let instance_id = config.server.instance_id.unwrap_or_else(Uuid::new_v4);
    let engine = RealtimeEngine::new(stores, bridge, config.realtime.clone(), instance_id);
    engine.start().await?;

    // ── Step 5: HTTP server ──────────────────────────────────────
    tracing::info!(
        "Starting HTTP server on {}:{}...",
        config.server.host,
        config.server.port
    );

    let authenticator = Arc::new(TokenAuthenticator::new(&config.auth));
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let grace = Duration::from_secs(config.server.shutdown_grace_seconds);

    let state = beacon_api::AppState {
        config: Arc::new(config),
        db: db.clone(),
        engine: Arc::clone(&engine),
        authenticator,
    };
    let app = beacon_api::build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {addr}: {e}")))?;

    tracing::info!("Beacon server listening on {addr}");

    // ── Step 6: Graceful shutdown ────────────────────────────────
    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown({
        let engine = Arc::clone(&engine);
        async move {
            shutdown_signal().await;
            tracing::info!("Shutdown signal received, starting graceful shutdown...");
            // The serve future drains only once the websocket handles close.
            if tokio::time::timeout(grace, engine.shutdown()).await.is_err() {
                tracing::warn!(
                    grace_seconds = grace.as_secs(),
                    "Close pass did not finish within the grace period"
                );
            }
        }
    });

    server
        .await
        .map_err(|e| AppError::internal(format!("Server error: {e}")))?;

    db.close().await;
    tracing::info!("Beacon server shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
