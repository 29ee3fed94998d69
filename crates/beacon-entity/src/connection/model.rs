//! Connection entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::ConnectionStatus;

/// A WebSocket connection tracked in the datastore.
///
/// One row per socket for the lifetime of the process fleet; rows are
/// marked disconnected rather than deleted so that reconnect storms and
/// crash recovery can be diagnosed after the fact.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Connection {
    /// Unique connection identifier; doubles as the wire-visible socket ID.
    pub id: Uuid,
    /// The authenticated user, if any. Anonymous connections carry `None`.
    pub user_id: Option<Uuid>,
    /// Session claim from the presented token, if any.
    pub session_id: Option<Uuid>,
    /// Current lifecycle status.
    pub status: ConnectionStatus,
    /// Transport name (`"websocket"`).
    pub transport: String,
    /// Remote peer address as reported at accept time.
    pub remote_addr: Option<String>,
    /// Client-supplied device descriptor (JSON).
    pub device_info: Option<serde_json::Value>,
    /// The server instance that owns the socket.
    pub instance_id: Uuid,
    /// When the last client ping arrived.
    pub last_ping_at: DateTime<Utc>,
    /// When the last pong reply was sent.
    pub last_pong_at: Option<DateTime<Utc>>,
    /// Client-reported round-trip latency in milliseconds.
    pub latency_ms: Option<i32>,
    /// When the connection was accepted.
    pub connected_at: DateTime<Utc>,
    /// When the connection was closed (terminal states only).
    pub disconnected_at: Option<DateTime<Utc>>,
}

impl Connection {
    /// Check whether the connection is live (not yet torn down).
    pub fn is_live(&self) -> bool {
        self.status.is_live() && self.disconnected_at.is_none()
    }

    /// Whether a user was resolved during the handshake.
    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    /// Seconds elapsed since the last client ping.
    pub fn seconds_since_ping(&self, now: DateTime<Utc>) -> i64 {
        (now - self.last_ping_at).num_seconds().max(0)
    }
}

/// Data required to record a newly accepted connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateConnection {
    /// The authenticated user, if any.
    pub user_id: Option<Uuid>,
    /// Session claim from the token, if any.
    pub session_id: Option<Uuid>,
    /// Transport name.
    pub transport: String,
    /// Remote peer address.
    pub remote_addr: Option<String>,
    /// Client-supplied device descriptor.
    pub device_info: Option<serde_json::Value>,
    /// The accepting server instance.
    pub instance_id: Uuid,
}
