//! Room domain entities.

pub mod member;
pub mod model;

pub use member::{MemberRole, RoomMember};
pub use model::{CreateRoom, Room};

use serde::{Deserialize, Serialize};

/// The kind of room, which constrains how clients use it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "room_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RoomType {
    /// A long-lived named channel.
    Channel,
    /// A two-party conversation.
    DirectMessage,
    /// An ad-hoc multi-party conversation.
    Group,
    /// One-to-many announcements; only privileged members publish.
    Broadcast,
}

impl RoomType {
    /// Return the type as a snake_case string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Channel => "channel",
            Self::DirectMessage => "direct_message",
            Self::Group => "group",
            Self::Broadcast => "broadcast",
        }
    }
}

impl std::fmt::Display for RoomType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Who can discover and enter a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "room_visibility", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RoomVisibility {
    /// Discoverable and joinable by anyone.
    Public,
    /// Joinable by invitation.
    Private,
    /// Hidden from listings entirely.
    Secret,
}

impl RoomVisibility {
    /// Return the visibility as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
            Self::Secret => "secret",
        }
    }
}

impl std::fmt::Display for RoomVisibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
