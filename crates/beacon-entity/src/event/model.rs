//! Event log entry entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// An immutable event log entry recording a lifecycle occurrence.
///
/// The log is append-only and best-effort; nothing reads it on any hot
/// path. Entries never include message bodies.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    /// Unique event identifier.
    pub id: Uuid,
    /// Dotted event name (e.g., `"connection.opened"`, `"room.joined"`).
    pub event_type: String,
    /// The connection involved, if any.
    pub connection_id: Option<Uuid>,
    /// The user involved, if any.
    pub user_id: Option<Uuid>,
    /// The room involved, if any.
    pub room_id: Option<Uuid>,
    /// Additional context (JSON). Never the message payload itself.
    pub payload: Option<serde_json::Value>,
    /// Remote address of the triggering connection.
    pub remote_addr: Option<String>,
    /// When the event occurred.
    pub created_at: DateTime<Utc>,
}

/// Data required to append a new event log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEvent {
    /// Dotted event name.
    pub event_type: String,
    /// The connection involved.
    pub connection_id: Option<Uuid>,
    /// The user involved.
    pub user_id: Option<Uuid>,
    /// The room involved.
    pub room_id: Option<Uuid>,
    /// Additional context.
    pub payload: Option<serde_json::Value>,
    /// Remote address of the triggering connection.
    pub remote_addr: Option<String>,
}

impl CreateEvent {
    /// An event with only a type name; context fields start empty.
    pub fn named(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            connection_id: None,
            user_id: None,
            room_id: None,
            payload: None,
            remote_addr: None,
        }
    }

    /// Attach the connection that triggered the event.
    pub fn connection(mut self, connection_id: Uuid) -> Self {
        self.connection_id = Some(connection_id);
        self
    }

    /// Attach the user involved.
    pub fn user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Attach the room involved.
    pub fn room(mut self, room_id: Uuid) -> Self {
        self.room_id = Some(room_id);
        self
    }

    /// Attach JSON context.
    pub fn payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Attach the remote address.
    pub fn remote_addr(mut self, remote_addr: impl Into<String>) -> Self {
        self.remote_addr = Some(remote_addr.into());
        self
    }
}
