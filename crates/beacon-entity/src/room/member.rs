//! Room membership entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A user's role within a single room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "member_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    /// Full control over the room.
    Admin,
    /// Can moderate members and messages.
    Moderator,
    /// Regular participant.
    Member,
    /// Restricted participant.
    Guest,
}

impl MemberRole {
    /// Check whether the role can moderate the room.
    pub fn can_moderate(&self) -> bool {
        matches!(self, Self::Admin | Self::Moderator)
    }

    /// Return the role as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Moderator => "moderator",
            Self::Member => "member",
            Self::Guest => "guest",
        }
    }
}

impl std::fmt::Display for MemberRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A membership row keyed on `(room_id, user_id)`.
///
/// The composite primary key is the serialization point for concurrent
/// joins: the upsert either inserts one row or touches the existing one,
/// never duplicates.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RoomMember {
    /// The room.
    pub room_id: Uuid,
    /// The member.
    pub user_id: Uuid,
    /// Role within the room.
    pub role: MemberRole,
    /// Whether the member is muted.
    pub is_muted: bool,
    /// Whether the member is banned.
    pub is_banned: bool,
    /// When the user first joined; preserved across idempotent re-joins.
    pub joined_at: DateTime<Utc>,
    /// Last time the member was seen active in the room.
    pub last_seen_at: DateTime<Utc>,
}

impl RoomMember {
    /// Whether the member may currently publish to the room.
    pub fn can_publish(&self) -> bool {
        !self.is_muted && !self.is_banned
    }
}
