//! Store traits the realtime core runs against.
//!
//! The Postgres repositories in this crate are the production
//! implementations; tests substitute in-memory doubles. Every mutation
//! that multiple instances can race on is a single SQL statement in the
//! production implementations, and doubles must preserve the same
//! atomicity per call.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use beacon_core::result::AppResult;
use beacon_entity::connection::{Connection, CreateConnection};
use beacon_entity::event::{CreateEvent, Event};
use beacon_entity::presence::{Presence, PresenceStatus};
use beacon_entity::room::{CreateRoom, MemberRole, Room, RoomMember};
use beacon_entity::typing::TypingIndicator;

/// Outcome of a membership upsert.
///
/// `newly_joined` distinguishes a first join from an idempotent re-join;
/// only first joins notify the rest of the room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberUpsert {
    /// The membership row after the upsert.
    pub member: RoomMember,
    /// Whether this call inserted the row.
    pub newly_joined: bool,
}

/// Persistence operations for connection rows.
#[async_trait]
pub trait ConnectionStore: Send + Sync + std::fmt::Debug + 'static {
    /// Record a newly accepted connection (status `connected`).
    async fn create(&self, data: &CreateConnection) -> AppResult<Connection>;

    /// Find a connection by ID.
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Connection>>;

    /// Stamp a client ping, storing the reported latency when present.
    async fn record_ping(&self, id: Uuid, latency_ms: Option<i32>) -> AppResult<()>;

    /// Mark a connection disconnected. Returns `false` when the row was
    /// already terminal, making repeated closes no-ops.
    async fn mark_disconnected(&self, id: Uuid) -> AppResult<bool>;

    /// Live connections for a user, oldest first (for cap eviction).
    async fn find_live_by_user(&self, user_id: Uuid) -> AppResult<Vec<Connection>>;

    /// Mark every live connection owned by an instance disconnected,
    /// returning the affected rows (startup crash recovery).
    async fn reap_instance(&self, instance_id: Uuid) -> AppResult<Vec<Connection>>;

    /// Count all connection rows ever recorded.
    async fn count_total(&self) -> AppResult<i64>;

    /// Count live connections fleet-wide.
    async fn count_live(&self) -> AppResult<i64>;

    /// Count live connections with a resolved user.
    async fn count_live_authenticated(&self) -> AppResult<i64>;
}

/// Persistence operations for rooms.
#[async_trait]
pub trait RoomStore: Send + Sync + std::fmt::Debug + 'static {
    /// Create a room, or reactivate and update an existing one by name.
    async fn create(&self, data: &CreateRoom) -> AppResult<Room>;

    /// Find a room by its unique name, active or not.
    async fn find_by_name(&self, name: &str) -> AppResult<Option<Room>>;

    /// Count active rooms.
    async fn count_active(&self) -> AppResult<i64>;
}

/// Persistence operations for room membership.
#[async_trait]
pub trait RoomMemberStore: Send + Sync + std::fmt::Debug + 'static {
    /// Upsert a membership on `(room_id, user_id)`. Re-joins touch
    /// `last_seen_at` and preserve `joined_at`.
    async fn upsert(&self, room_id: Uuid, user_id: Uuid, role: MemberRole)
    -> AppResult<MemberUpsert>;

    /// Delete a membership. Returns `false` when none existed.
    async fn delete(&self, room_id: Uuid, user_id: Uuid) -> AppResult<bool>;

    /// Count members of a room.
    async fn count(&self, room_id: Uuid) -> AppResult<i64>;
}

/// Persistence operations for aggregate presence.
///
/// The count transitions are the contended path; implementations must
/// make each call one atomic read-modify-write per user.
#[async_trait]
pub trait PresenceStore: Send + Sync + std::fmt::Debug + 'static {
    /// Register one more live connection for a user, deriving the status
    /// transition in the same statement. Returns the row after the call.
    async fn connection_opened(&self, user_id: Uuid) -> AppResult<Presence>;

    /// Register one less live connection (clamped at zero), deriving the
    /// status transition in the same statement. Returns the row after
    /// the call, or `None` when the user has no presence row.
    async fn connection_closed(&self, user_id: Uuid) -> AppResult<Option<Presence>>;

    /// Store an explicit status override.
    async fn set_status(
        &self,
        user_id: Uuid,
        status: PresenceStatus,
        custom_status: Option<&str>,
        custom_emoji: Option<&str>,
        custom_expires_at: Option<DateTime<Utc>>,
    ) -> AppResult<Presence>;

    /// Refresh heartbeat timestamps without touching status.
    async fn heartbeat(&self, user_id: Uuid) -> AppResult<()>;

    /// Fetch a user's presence row.
    async fn get(&self, user_id: Uuid) -> AppResult<Option<Presence>>;

    /// Clear overrides whose expiry has passed, restoring the
    /// count-derived status. Returns the rows that changed.
    async fn expire_overrides(&self) -> AppResult<Vec<Presence>>;

    /// Count users whose stored status is not offline.
    async fn count_online(&self) -> AppResult<i64>;
}

/// Persistence operations for typing indicators.
#[async_trait]
pub trait TypingStore: Send + Sync + std::fmt::Debug + 'static {
    /// Upsert an indicator expiring `ttl_seconds` from now. Renewal
    /// keeps `started_at`.
    async fn start(
        &self,
        room_id: Uuid,
        user_id: Uuid,
        thread_id: Option<Uuid>,
        ttl_seconds: i64,
    ) -> AppResult<TypingIndicator>;

    /// Delete an indicator. Returns `false` when none existed.
    async fn stop(&self, room_id: Uuid, user_id: Uuid, thread_id: Option<Uuid>) -> AppResult<bool>;

    /// Unexpired indicators for a room/thread, oldest first. Expiry is
    /// evaluated inside the query, never left to the sweep.
    async fn current(&self, room_id: Uuid, thread_id: Option<Uuid>)
    -> AppResult<Vec<TypingIndicator>>;

    /// Delete expired indicators, returning how many went away.
    async fn sweep(&self) -> AppResult<u64>;
}

/// Persistence operations for the append-only event log.
#[async_trait]
pub trait EventStore: Send + Sync + std::fmt::Debug + 'static {
    /// Append one event.
    async fn append(&self, data: &CreateEvent) -> AppResult<Event>;

    /// Most recent events, newest first.
    async fn recent(&self, limit: i64) -> AppResult<Vec<Event>>;
}
