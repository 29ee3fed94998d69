//! Heartbeat reaper — closes connections that stopped pinging.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::connection::manager::{CloseReason, ConnectionManager};
use crate::connection::pool::ConnectionPool;

/// Sweeps the local pool on an interval, closing connections whose
/// last ping is older than the heartbeat timeout. Runs until the
/// shutdown signal fires.
pub async fn run_reaper(
    manager: Arc<ConnectionManager>,
    pool: Arc<ConnectionPool>,
    interval_seconds: u64,
    mut shutdown: broadcast::Receiver<()>,
) {
    // tokio panics on a zero interval.
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_seconds.max(1)));
    loop {
        tokio::select! {
            _ = ticker.tick() => reap_once(&manager, &pool).await,
            _ = shutdown.recv() => {
                info!("Connection reaper stopping");
                break;
            }
        }
    }
}

async fn reap_once(manager: &ConnectionManager, pool: &ConnectionPool) {
    let timeout = manager.heartbeat_timeout_seconds() as i64;
    let now = Utc::now();
    for handle in pool.all() {
        let age = handle.seconds_since_ping(now).await;
        if age <= timeout {
            continue;
        }
        debug!(conn_id = %handle.id, age_seconds = age, "Reaping silent connection");
        if let Err(e) = manager
            .close(handle.id, CloseReason::HeartbeatTimeout)
            .await
        {
            warn!(conn_id = %handle.id, "Failed to reap connection: {e}");
        }
    }
}
