//! Typing indicator entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A self-expiring "user is typing" marker.
///
/// One row per `(room, user, thread)`; repeated starts renew
/// `expires_at` in place. Rows past their expiry are invisible to reads
/// regardless of whether the sweep has deleted them yet.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TypingIndicator {
    /// The room being typed in.
    pub room_id: Uuid,
    /// The typist.
    pub user_id: Uuid,
    /// Optional thread within the room.
    pub thread_id: Option<Uuid>,
    /// When typing began (or was last renewed from scratch).
    pub started_at: DateTime<Utc>,
    /// When the indicator lapses without an explicit stop.
    pub expires_at: DateTime<Utc>,
}

impl TypingIndicator {
    /// Whether the indicator has lapsed at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
