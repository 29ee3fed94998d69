//! Room entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::{RoomType, RoomVisibility};

/// A named broadcast scope that users join and leave.
///
/// Rooms are soft-deleted (`is_active = false`) and never hard-deleted
/// while members exist; re-creating a room by name reactivates it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Room {
    /// Unique room identifier.
    pub id: Uuid,
    /// Unique room name; the client-facing handle for every room op.
    pub name: String,
    /// Kind of room.
    pub room_type: RoomType,
    /// Discovery and join policy.
    pub visibility: RoomVisibility,
    /// Optional membership cap.
    pub max_members: Option<i32>,
    /// Soft-delete flag.
    pub is_active: bool,
    /// When the room was created.
    pub created_at: DateTime<Utc>,
    /// When the room was last modified.
    pub updated_at: DateTime<Utc>,
}

/// Data required to create (or reactivate) a room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRoom {
    /// Unique room name.
    pub name: String,
    /// Kind of room.
    pub room_type: RoomType,
    /// Discovery and join policy.
    pub visibility: RoomVisibility,
    /// Optional membership cap.
    pub max_members: Option<i32>,
}

impl CreateRoom {
    /// A public channel with no membership cap.
    pub fn channel(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            room_type: RoomType::Channel,
            visibility: RoomVisibility::Public,
            max_members: None,
        }
    }
}
