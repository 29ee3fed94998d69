//! Individual WebSocket connection handle.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use uuid::Uuid;

use beacon_entity::user::UserRole;

use crate::message::ServerMessage;

/// Unique connection identifier; equals the connection's datastore row id.
pub type ConnectionId = Uuid;

/// A handle to one live WebSocket connection on this instance.
///
/// Holds the sender half of the socket's outbound channel plus the
/// identity resolved during the handshake. Anonymous connections carry
/// no user id and are limited to heartbeats.
#[derive(Debug)]
pub struct ConnectionHandle {
    /// Connection ID (the `connections` row id).
    pub id: ConnectionId,
    /// Authenticated user, if any.
    pub user_id: Option<Uuid>,
    /// Session claim from the presented token, if any.
    pub session_id: Option<Uuid>,
    /// Role from the token; `None` for anonymous connections.
    pub role: Option<UserRole>,
    /// Remote peer address, for logs and the event log.
    pub remote_addr: Option<String>,
    /// Sender for outbound events.
    pub sender: mpsc::Sender<ServerMessage>,
    /// When the connection was accepted.
    pub connected_at: DateTime<Utc>,
    /// Last client ping, read by the reaper.
    pub last_ping: tokio::sync::RwLock<DateTime<Utc>>,
    /// Whether the connection is still alive.
    pub alive: AtomicBool,
}

impl ConnectionHandle {
    /// Create a handle for an accepted connection.
    pub fn new(
        id: ConnectionId,
        user_id: Option<Uuid>,
        session_id: Option<Uuid>,
        role: Option<UserRole>,
        remote_addr: Option<String>,
        sender: mpsc::Sender<ServerMessage>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id,
            session_id,
            role,
            remote_addr,
            sender,
            connected_at: now,
            last_ping: tokio::sync::RwLock::new(now),
            alive: AtomicBool::new(true),
        }
    }

    /// Push an event to this connection.
    ///
    /// Non-blocking: a full buffer drops the event for this connection
    /// only, and a closed channel marks the handle dead.
    pub fn send(&self, msg: ServerMessage) -> bool {
        if !self.is_alive() {
            return false;
        }
        match self.sender.try_send(msg) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!("Connection {} send buffer full, dropping event", self.id);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.mark_dead();
                false
            }
        }
    }

    /// Check if the connection is alive.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Mark the connection dead; no further sends will be attempted.
    pub fn mark_dead(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    /// Whether a user was resolved during the handshake.
    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    /// Whether the token carried an admin role.
    pub fn is_admin(&self) -> bool {
        matches!(self.role, Some(UserRole::Admin))
    }

    /// Stamp a client ping.
    pub async fn record_ping(&self) {
        let mut lp = self.last_ping.write().await;
        *lp = Utc::now();
    }

    /// Seconds since the last client ping.
    pub async fn seconds_since_ping(&self, now: DateTime<Utc>) -> i64 {
        let last = *self.last_ping.read().await;
        (now - last).num_seconds().max(0)
    }
}
