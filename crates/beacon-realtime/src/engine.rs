//! Engine wiring and lifecycle.
//!
//! [`RealtimeEngine`] owns every subsystem and the background loops
//! that keep them honest: the heartbeat reaper, the typing and presence
//! sweeps, and the bridge relay that feeds remote envelopes into the
//! local dispatcher.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use beacon_core::config::realtime::RealtimeConfig;
use beacon_core::result::AppResult;
use beacon_core::traits::bridge::FanoutBridge;
use beacon_database::stores::{
    ConnectionStore, EventStore, PresenceStore, RoomMemberStore, RoomStore, TypingStore,
};

use crate::audit::EventLogger;
use crate::connection::manager::{CloseReason, ConnectionManager};
use crate::connection::pool::ConnectionPool;
use crate::connection::reaper::run_reaper;
use crate::dispatch::EventDispatcher;
use crate::metrics::EngineMetrics;
use crate::presence::PresenceTracker;
use crate::room::{RoomManager, RoomRegistry};
use crate::typing::TypingEngine;

/// Store handles the engine runs against.
///
/// Production wiring passes the Postgres repositories; tests pass
/// in-memory doubles.
#[derive(Debug, Clone)]
pub struct EngineStores {
    /// Connection rows.
    pub connections: Arc<dyn ConnectionStore>,
    /// Rooms.
    pub rooms: Arc<dyn RoomStore>,
    /// Room membership.
    pub members: Arc<dyn RoomMemberStore>,
    /// Aggregate presence.
    pub presence: Arc<dyn PresenceStore>,
    /// Typing indicators.
    pub typing: Arc<dyn TypingStore>,
    /// The append-only event log.
    pub events: Arc<dyn EventStore>,
}

/// Aggregate statistics served by the metrics endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    /// Connection figures for this instance.
    pub connections: ConnectionStats,
    /// Frame and bridge throughput for this instance.
    pub traffic: TrafficStats,
    /// Active rooms fleet-wide.
    pub rooms: i64,
    /// Users currently online fleet-wide.
    pub presence: i64,
    /// Resident memory of this process in bytes.
    pub memory: u64,
    /// CPU usage of this process in percent.
    pub cpu: f32,
}

/// Connection counts for one instance.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStats {
    /// Connections ever accepted by this instance.
    pub total: u64,
    /// Connections currently open.
    pub active: usize,
    /// Open connections with a resolved user.
    pub authenticated: usize,
    /// Open connections without one.
    pub anonymous: usize,
}

/// Frame and bridge counters for one instance.
#[derive(Debug, Clone, Serialize)]
pub struct TrafficStats {
    /// Frames received from clients.
    pub received: u64,
    /// Frames delivered to clients.
    pub sent: u64,
    /// Frames dropped on full send buffers.
    pub dropped: u64,
    /// Envelopes published to the bridge.
    pub bridge_published: u64,
    /// Envelopes consumed from other instances.
    pub bridge_received: u64,
}

/// The realtime core, fully wired.
#[derive(Debug)]
pub struct RealtimeEngine {
    pool: Arc<ConnectionPool>,
    bridge: Arc<dyn FanoutBridge>,
    dispatcher: Arc<EventDispatcher>,
    presence: Arc<PresenceTracker>,
    typing: Arc<TypingEngine>,
    rooms: Arc<RoomManager>,
    manager: Arc<ConnectionManager>,
    metrics: Arc<EngineMetrics>,
    audit: EventLogger,
    config: RealtimeConfig,
    instance_id: Uuid,
    started_at: DateTime<Utc>,
    shutdown: broadcast::Sender<()>,
}

impl RealtimeEngine {
    /// Wires the engine from its stores, bridge, and configuration.
    pub fn new(
        stores: EngineStores,
        bridge: Arc<dyn FanoutBridge>,
        config: RealtimeConfig,
        instance_id: Uuid,
    ) -> Arc<Self> {
        let pool = Arc::new(ConnectionPool::new());
        let registry = Arc::new(RoomRegistry::new());
        let metrics = Arc::new(EngineMetrics::new());
        let audit = EventLogger::new(stores.events);
        let dispatcher = Arc::new(EventDispatcher::new(
            pool.clone(),
            registry.clone(),
            bridge.clone(),
            metrics.clone(),
            instance_id,
        ));
        let presence = Arc::new(PresenceTracker::new(stores.presence, dispatcher.clone()));
        let typing = Arc::new(TypingEngine::new(
            stores.typing,
            stores.rooms.clone(),
            dispatcher.clone(),
            config.typing_ttl_seconds as i64,
        ));
        let rooms = Arc::new(RoomManager::new(
            stores.rooms,
            stores.members,
            registry.clone(),
            dispatcher.clone(),
            audit.clone(),
        ));
        let manager = Arc::new(ConnectionManager::new(
            pool.clone(),
            registry,
            stores.connections,
            presence.clone(),
            rooms.clone(),
            typing.clone(),
            metrics.clone(),
            audit.clone(),
            config.clone(),
            instance_id,
        ));
        let (shutdown, _) = broadcast::channel(1);

        Arc::new(Self {
            pool,
            bridge,
            dispatcher,
            presence,
            typing,
            rooms,
            manager,
            metrics,
            audit,
            config,
            instance_id,
            started_at: Utc::now(),
            shutdown,
        })
    }

    /// Starts the engine: recovers rows left by a previous run of this
    /// instance, then spawns the background loops. Call once, before
    /// accepting the first connection.
    pub async fn start(&self) -> AppResult<()> {
        self.manager.recover_crashed().await?;

        self.spawn_bridge_relay();
        tokio::spawn(run_reaper(
            self.manager.clone(),
            self.pool.clone(),
            self.config.reaper_interval_seconds,
            self.shutdown.subscribe(),
        ));
        self.spawn_typing_sweep();
        self.spawn_presence_sweep();

        info!(
            instance_id = %self.instance_id,
            bridge = self.bridge.provider_name(),
            "Realtime engine started"
        );
        Ok(())
    }

    /// Stops the background loops and closes every connection.
    pub async fn shutdown(&self) {
        // Loops stop first so the reaper cannot race the close pass.
        let _ = self.shutdown.send(());
        let closed = self.manager.close_all(CloseReason::Shutdown).await;
        info!(closed, "Realtime engine stopped");
    }

    /// The connection manager, for the transport layer.
    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    /// The room manager, for administrative room provisioning.
    pub fn rooms(&self) -> &Arc<RoomManager> {
        &self.rooms
    }

    /// The fan-out bridge, for health checks.
    pub fn bridge(&self) -> &Arc<dyn FanoutBridge> {
        &self.bridge
    }

    /// The engine counters.
    pub fn metrics(&self) -> &Arc<EngineMetrics> {
        &self.metrics
    }

    /// The event logger, for incident diagnosis queries.
    pub fn audit(&self) -> &EventLogger {
        &self.audit
    }

    /// This instance's identity.
    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    /// Open connections on this instance.
    pub fn connection_count(&self) -> usize {
        self.pool.len()
    }

    /// Seconds since the engine was wired.
    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }

    /// Aggregate statistics for the metrics endpoint.
    pub async fn stats(&self) -> AppResult<EngineStats> {
        let snapshot = self.metrics.snapshot();
        let process = self.metrics.process_stats();
        let active = self.pool.len();
        let anonymous = self.pool.anonymous_count();
        Ok(EngineStats {
            connections: ConnectionStats {
                total: snapshot.connections_total,
                active,
                authenticated: active.saturating_sub(anonymous),
                anonymous,
            },
            traffic: TrafficStats {
                received: snapshot.messages_received,
                sent: snapshot.messages_sent,
                dropped: snapshot.messages_dropped,
                bridge_published: snapshot.bridge_published,
                bridge_received: snapshot.bridge_received,
            },
            rooms: self.rooms.active_room_count().await?,
            presence: self.presence.online_count().await?,
            memory: process.memory_bytes,
            cpu: process.cpu_percent,
        })
    }

    /// Relays envelopes from the bridge into the local dispatcher.
    fn spawn_bridge_relay(&self) {
        let dispatcher = self.dispatcher.clone();
        let mut events = self.bridge.subscribe();
        let mut shutdown = self.shutdown.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = events.recv() => match result {
                        Ok(envelope) => dispatcher.deliver_remote(envelope),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "Bridge relay lagged; remote envelopes were dropped");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            warn!("Bridge envelope stream closed");
                            break;
                        }
                    },
                    _ = shutdown.recv() => break,
                }
            }
        });
    }

    fn spawn_typing_sweep(&self) {
        let typing = self.typing.clone();
        let mut shutdown = self.shutdown.subscribe();
        let period = Duration::from_secs(self.config.typing_sweep_interval_seconds.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => match typing.sweep().await {
                        Ok(0) => {}
                        Ok(swept) => debug!(swept, "Swept expired typing indicators"),
                        Err(e) => warn!("Typing sweep failed: {e}"),
                    },
                    _ = shutdown.recv() => break,
                }
            }
        });
    }

    fn spawn_presence_sweep(&self) {
        let presence = self.presence.clone();
        let mut shutdown = self.shutdown.subscribe();
        let period = Duration::from_secs(self.config.presence_sweep_interval_seconds.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => match presence.expire_overrides().await {
                        Ok(0) => {}
                        Ok(expired) => debug!(expired, "Expired presence overrides"),
                        Err(e) => warn!("Presence override sweep failed: {e}"),
                    },
                    _ = shutdown.recv() => break,
                }
            }
        });
    }
}
