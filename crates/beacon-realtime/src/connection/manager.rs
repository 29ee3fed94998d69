//! Connection lifecycle — accept, frame dispatch, and teardown.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use beacon_core::config::realtime::RealtimeConfig;
use beacon_core::error::AppError;
use beacon_core::result::AppResult;
use beacon_database::stores::ConnectionStore;
use beacon_entity::connection::{Connection, CreateConnection};
use beacon_entity::event::CreateEvent;

use crate::audit::EventLogger;
use crate::connection::authenticator::AuthenticatedUser;
use crate::connection::handle::{ConnectionHandle, ConnectionId};
use crate::connection::pool::ConnectionPool;
use crate::message::envelope::ClientEnvelope;
use crate::message::types::{ClientMessage, PROTOCOL_VERSION, ServerMessage};
use crate::metrics::EngineMetrics;
use crate::presence::PresenceTracker;
use crate::room::{RoomManager, RoomRegistry};
use crate::typing::TypingEngine;

/// Why a connection is being torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The client closed the socket, or the transport failed.
    ClientDisconnect,
    /// No client ping within the configured timeout.
    HeartbeatTimeout,
    /// Evicted to make room under the per-user connection cap.
    ConnectionLimit,
    /// The server is shutting down.
    Shutdown,
}

impl CloseReason {
    /// Reason label recorded in the event log payload.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClientDisconnect => "client_disconnect",
            Self::HeartbeatTimeout => "heartbeat_timeout",
            Self::ConnectionLimit => "connection_limit",
            Self::Shutdown => "shutdown",
        }
    }

    /// Event log entry type for this teardown.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::HeartbeatTimeout => "connection.timeout",
            _ => "connection.closed",
        }
    }
}

/// Orchestrates the connection lifecycle on this instance.
///
/// Owns the accept path (cap enforcement, registration, welcome
/// events), inbound frame dispatch, and teardown. Teardown is
/// serialized on the datastore row: whichever caller flips the row to
/// disconnected runs the user-visible side effects exactly once, no
/// matter how many closers race.
#[derive(Debug)]
pub struct ConnectionManager {
    /// Live connections on this instance.
    pool: Arc<ConnectionPool>,
    /// Local room subscriptions.
    registry: Arc<RoomRegistry>,
    /// Connection row persistence.
    connections: Arc<dyn ConnectionStore>,
    /// Presence counting and broadcasts.
    presence: Arc<PresenceTracker>,
    /// Room membership and messaging.
    rooms: Arc<RoomManager>,
    /// Typing indicators.
    typing: Arc<TypingEngine>,
    /// Counters and process stats.
    metrics: Arc<EngineMetrics>,
    /// Best-effort event log.
    audit: EventLogger,
    /// Engine tuning knobs.
    config: RealtimeConfig,
    /// Identity stamped on every connection row this instance creates.
    instance_id: Uuid,
}

impl ConnectionManager {
    /// Creates a connection manager wired to its collaborators.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: Arc<ConnectionPool>,
        registry: Arc<RoomRegistry>,
        connections: Arc<dyn ConnectionStore>,
        presence: Arc<PresenceTracker>,
        rooms: Arc<RoomManager>,
        typing: Arc<TypingEngine>,
        metrics: Arc<EngineMetrics>,
        audit: EventLogger,
        config: RealtimeConfig,
        instance_id: Uuid,
    ) -> Self {
        Self {
            pool,
            registry,
            connections,
            presence,
            rooms,
            typing,
            metrics,
            audit,
            config,
            instance_id,
        }
    }

    /// Accepts a connection whose handshake already completed.
    ///
    /// Registers the connection in the datastore and the local pool,
    /// bumps presence, and queues the `connected` (and, for resolved
    /// users, `authenticated`) welcome events. Returns the handle plus
    /// the receiver half of its outbound buffer; the transport task
    /// owns draining that receiver into the socket.
    pub async fn accept(
        &self,
        user: Option<AuthenticatedUser>,
        remote_addr: Option<String>,
        device_info: Option<serde_json::Value>,
    ) -> AppResult<(Arc<ConnectionHandle>, mpsc::Receiver<ServerMessage>)> {
        if let Some(auth) = &user {
            let live = self.connections.find_live_by_user(auth.user_id).await?;
            if live.len() >= self.config.max_connections_per_user {
                self.evict_oldest(auth.user_id, &live).await;
            }
        }

        let row = self
            .connections
            .create(&CreateConnection {
                user_id: user.as_ref().map(|u| u.user_id),
                session_id: user.as_ref().and_then(|u| u.session_id),
                transport: "websocket".to_string(),
                remote_addr: remote_addr.clone(),
                device_info,
                instance_id: self.instance_id,
            })
            .await?;

        let (tx, rx) = mpsc::channel(self.config.send_buffer_size);
        let handle = Arc::new(ConnectionHandle::new(
            row.id,
            row.user_id,
            row.session_id,
            user.as_ref().map(|u| u.role),
            remote_addr.clone(),
            tx,
        ));

        self.pool.add(handle.clone());
        self.metrics.record_connected();

        if let Some(user_id) = handle.user_id {
            if let Err(e) = self.presence.connection_opened(user_id).await {
                // Half-registered connections are torn back down rather
                // than left with a presence count that will never be
                // decremented.
                self.pool.remove(&handle.id);
                self.metrics.record_disconnected();
                if let Err(db_err) = self.connections.mark_disconnected(handle.id).await {
                    warn!(conn_id = %handle.id, "Failed to roll back connection row: {db_err}");
                }
                return Err(e);
            }
        }

        self.send_counted(
            &handle,
            ServerMessage::Connected {
                socket_id: handle.id,
                server_time: Utc::now(),
                protocol_version: PROTOCOL_VERSION.to_string(),
            },
        );
        if let Some(user_id) = handle.user_id {
            self.send_counted(
                &handle,
                ServerMessage::Authenticated {
                    user_id,
                    session_id: handle.session_id,
                },
            );
        }

        let mut event = CreateEvent::named("connection.opened").connection(handle.id);
        if let Some(user_id) = handle.user_id {
            event = event.user(user_id);
        }
        if let Some(addr) = &remote_addr {
            event = event.remote_addr(addr.clone());
        }
        self.audit.log(event);

        info!(
            conn_id = %handle.id,
            authenticated = handle.is_authenticated(),
            "Connection accepted"
        );
        Ok((handle, rx))
    }

    /// Handles one inbound text frame from a connection.
    ///
    /// Frames that fail to parse are answered with an `error` event;
    /// parsed operations are dispatched, and their outcome is routed to
    /// an `ack` when the client supplied a request id.
    pub async fn handle_frame(&self, conn_id: ConnectionId, raw: &str) {
        let Some(handle) = self.pool.get(&conn_id) else {
            warn!(%conn_id, "Dropping frame from unknown connection");
            return;
        };
        self.metrics.record_received();

        let envelope = match ClientEnvelope::parse(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                let error = AppError::validation(format!("Unparseable frame: {e}"));
                self.send_counted(&handle, ServerMessage::error_event(&error));
                return;
            }
        };

        match (envelope.id, self.dispatch_op(&handle, envelope.op).await) {
            (Some(id), Ok(data)) => {
                self.send_counted(&handle, ServerMessage::ack_ok(id, data));
            }
            (Some(id), Err(error)) => {
                debug!(conn_id = %handle.id, request_id = id, "Operation failed: {error}");
                self.send_counted(&handle, ServerMessage::ack_err(id, &error));
            }
            // Fire-and-forget success stays silent.
            (None, Ok(_)) => {}
            (None, Err(error)) => {
                debug!(conn_id = %handle.id, "Operation failed: {error}");
                self.send_counted(&handle, ServerMessage::error_event(&error));
            }
        }
    }

    /// Tears down a connection.
    ///
    /// Local traces (pool entry, room subscriptions) are dropped on
    /// every call; the presence decrement and event log entry run only
    /// on the call that actually flipped the datastore row. A datastore
    /// error leaves the row live so the reaper can retry later.
    pub async fn close(&self, conn_id: ConnectionId, reason: CloseReason) -> AppResult<()> {
        let newly_closed = self.connections.mark_disconnected(conn_id).await?;

        let handle = self.pool.remove(&conn_id);
        if let Some(handle) = &handle {
            handle.mark_dead();
            self.registry.unsubscribe_all(handle.id);
            self.metrics.record_disconnected();
        }

        if !newly_closed {
            return Ok(());
        }

        let user_id = match &handle {
            Some(handle) => handle.user_id,
            // The row winner can lose the pool race; fall back to the row.
            None => self
                .connections
                .find_by_id(conn_id)
                .await?
                .and_then(|row| row.user_id),
        };
        if let Some(user_id) = user_id {
            if let Err(e) = self.presence.connection_closed(user_id).await {
                warn!(%user_id, "Failed to decrement presence on close: {e}");
            }
        }

        let mut event = CreateEvent::named(reason.event_type())
            .connection(conn_id)
            .payload(json!({ "reason": reason.as_str() }));
        if let Some(user_id) = user_id {
            event = event.user(user_id);
        }
        self.audit.log(event);

        info!(%conn_id, reason = reason.as_str(), "Connection closed");
        Ok(())
    }

    /// Closes every connection on this instance, returning how many
    /// were open when the pass started.
    pub async fn close_all(&self, reason: CloseReason) -> usize {
        let handles = self.pool.all();
        let count = handles.len();
        for handle in handles {
            if let Err(e) = self.close(handle.id, reason).await {
                warn!(conn_id = %handle.id, "Failed to close connection: {e}");
            }
        }
        count
    }

    /// Recovers connection rows left live by a previous run of this
    /// instance, decrementing presence for each. Runs once at startup,
    /// before the first accept.
    pub async fn recover_crashed(&self) -> AppResult<usize> {
        let reaped = self.connections.reap_instance(self.instance_id).await?;
        for row in &reaped {
            if let Some(user_id) = row.user_id {
                if let Err(e) = self.presence.connection_closed(user_id).await {
                    warn!(%user_id, "Failed to decrement presence for reaped connection: {e}");
                }
            }
            let mut event = CreateEvent::named("connection.reaped")
                .connection(row.id)
                .payload(json!({ "reason": "instance_restart" }));
            if let Some(user_id) = row.user_id {
                event = event.user(user_id);
            }
            self.audit.log(event);
        }
        if !reaped.is_empty() {
            info!(
                count = reaped.len(),
                "Recovered connection rows left by a previous run"
            );
        }
        Ok(reaped.len())
    }

    /// Seconds without a ping before the reaper closes a connection.
    pub fn heartbeat_timeout_seconds(&self) -> u64 {
        self.config.heartbeat_timeout_seconds
    }

    async fn dispatch_op(
        &self,
        handle: &Arc<ConnectionHandle>,
        op: ClientMessage,
    ) -> AppResult<Option<serde_json::Value>> {
        match op {
            ClientMessage::RoomJoin { room_name } => {
                let ack = self.rooms.join(handle, &room_name).await?;
                Ok(Some(serde_json::to_value(ack)?))
            }
            ClientMessage::RoomLeave { room_name } => {
                self.rooms.leave(handle, &room_name).await?;
                Ok(None)
            }
            ClientMessage::MessageSend {
                room_name,
                content,
                thread_id,
                metadata,
            } => {
                let timestamp = self
                    .rooms
                    .send_message(handle, &room_name, content, thread_id, metadata)
                    .await?;
                Ok(Some(json!({ "timestamp": timestamp })))
            }
            ClientMessage::TypingStart {
                room_name,
                thread_id,
            } => {
                let user_id = handle.user_id.ok_or_else(|| {
                    AppError::authorization("Authentication required for typing indicators")
                })?;
                self.typing.start(&room_name, user_id, thread_id).await?;
                Ok(None)
            }
            ClientMessage::TypingStop {
                room_name,
                thread_id,
            } => {
                let user_id = handle.user_id.ok_or_else(|| {
                    AppError::authorization("Authentication required for typing indicators")
                })?;
                self.typing.stop(&room_name, user_id, thread_id).await?;
                Ok(None)
            }
            ClientMessage::PresenceUpdate {
                status,
                custom_status,
                custom_emoji,
                expires_in_seconds,
            } => {
                let user_id = handle.user_id.ok_or_else(|| {
                    AppError::authorization("Authentication required to set presence")
                })?;
                let presence = self
                    .presence
                    .set_status(user_id, status, custom_status, custom_emoji, expires_in_seconds)
                    .await?;
                Ok(Some(json!({
                    "status": presence.effective_status(Utc::now())
                })))
            }
            ClientMessage::Ping {
                timestamp,
                latency_ms,
            } => {
                self.handle_ping(handle, timestamp, latency_ms).await;
                Ok(None)
            }
        }
    }

    /// Pongs are sent directly rather than through the ack path, so a
    /// ping with an id gets both a pong and an ack.
    async fn handle_ping(
        &self,
        handle: &Arc<ConnectionHandle>,
        timestamp: Option<i64>,
        latency_ms: Option<i32>,
    ) {
        handle.record_ping().await;
        if let Err(e) = self.connections.record_ping(handle.id, latency_ms).await {
            warn!(conn_id = %handle.id, "Failed to persist ping: {e}");
        }
        if let Some(user_id) = handle.user_id {
            if let Err(e) = self.presence.heartbeat(user_id).await {
                warn!(%user_id, "Failed to refresh presence heartbeat: {e}");
            }
        }
        let timestamp = timestamp.unwrap_or_else(|| Utc::now().timestamp_millis());
        self.send_counted(handle, ServerMessage::Pong { timestamp });
    }

    /// Closes the oldest of a user's connections that lives on this
    /// instance. Rows owned by other instances cannot have their
    /// sockets closed from here; when every candidate is remote the cap
    /// is allowed to overshoot and the overshoot is logged.
    async fn evict_oldest(&self, user_id: Uuid, live: &[Connection]) {
        for row in live {
            let Some(handle) = self.pool.get(&row.id) else {
                continue;
            };
            self.send_counted(
                &handle,
                ServerMessage::error_event(&AppError::service_unavailable(
                    "Connection limit reached; closing this connection to make room for a newer one",
                )),
            );
            if let Err(e) = self.close(handle.id, CloseReason::ConnectionLimit).await {
                warn!(conn_id = %handle.id, "Failed to evict connection over the per-user cap: {e}");
            }
            return;
        }
        warn!(%user_id, "User exceeds the connection cap, but their oldest connections live on other instances");
    }

    fn send_counted(&self, handle: &ConnectionHandle, event: ServerMessage) {
        if handle.send(event) {
            self.metrics.record_sent();
        } else {
            self.metrics.record_dropped();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heartbeat_timeouts_get_their_own_event_type() {
        assert_eq!(CloseReason::HeartbeatTimeout.event_type(), "connection.timeout");
        assert_eq!(CloseReason::ClientDisconnect.event_type(), "connection.closed");
        assert_eq!(CloseReason::ConnectionLimit.event_type(), "connection.closed");
        assert_eq!(CloseReason::Shutdown.event_type(), "connection.closed");
    }
}
