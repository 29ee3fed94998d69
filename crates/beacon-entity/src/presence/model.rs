//! Presence entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::PresenceStatus;

/// Aggregate presence for one user across all of their connections.
///
/// `connections_count` is maintained by single-statement atomic SQL; it
/// can never go below zero. While `explicit_status` is set, automatic
/// online/offline transitions defer to the user's chosen status until
/// the override expires, is replaced, or the last connection closes.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Presence {
    /// The user.
    pub user_id: Uuid,
    /// Stored status (may be an explicit override).
    pub status: PresenceStatus,
    /// Free-form status text chosen by the user.
    pub custom_status: Option<String>,
    /// Emoji accompanying the custom status.
    pub custom_emoji: Option<String>,
    /// When the explicit override lapses; `None` means until replaced.
    pub custom_expires_at: Option<DateTime<Utc>>,
    /// Whether an explicit override is currently in force.
    pub explicit_status: bool,
    /// Count of live connections, clamped at zero.
    pub connections_count: i32,
    /// Last time any of the user's connections did something.
    pub last_active_at: DateTime<Utc>,
    /// Last heartbeat from any connection.
    pub last_heartbeat_at: DateTime<Utc>,
    /// When the row last changed.
    pub updated_at: DateTime<Utc>,
}

impl Presence {
    /// Whether an explicit override is set and has not lapsed at `now`.
    ///
    /// An override without an expiry holds until replaced or until the
    /// user's last connection closes.
    pub fn has_active_override(&self, now: DateTime<Utc>) -> bool {
        self.explicit_status
            && match self.custom_expires_at {
                Some(expires_at) => expires_at > now,
                None => true,
            }
    }

    /// Whether the override survives the count reaching zero.
    ///
    /// Only overrides carrying their own unexpired expiry outlive the
    /// last connection; open-ended overrides end with it.
    pub fn override_survives_disconnect(&self, now: DateTime<Utc>) -> bool {
        self.explicit_status
            && matches!(self.custom_expires_at, Some(expires_at) if expires_at > now)
    }

    /// The status readers should report at `now`.
    ///
    /// Derives the count-based status when a stored override has lapsed,
    /// so correctness never depends on the expiry sweep having run.
    pub fn effective_status(&self, now: DateTime<Utc>) -> PresenceStatus {
        if self.connections_count == 0 {
            if self.override_survives_disconnect(now) {
                self.status
            } else {
                PresenceStatus::Offline
            }
        } else if self.explicit_status && !self.has_active_override(now) {
            PresenceStatus::Online
        } else {
            self.status
        }
    }
}
