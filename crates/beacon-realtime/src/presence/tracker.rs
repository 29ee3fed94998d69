//! Presence tracker — aggregate online state across all connections.
//!
//! The datastore owns the truth: every count transition is one atomic
//! statement in the store, and this tracker only decides which
//! transitions the fleet gets told about. A user with three tabs open
//! produces one `presence:changed` on the first connect and one on the
//! last disconnect, nothing in between.

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use beacon_core::error::AppError;
use beacon_core::result::AppResult;
use beacon_database::stores::PresenceStore;
use beacon_entity::presence::{Presence, PresenceStatus};

use crate::dispatch::EventDispatcher;
use crate::message::ServerMessage;

/// Tracks presence transitions and broadcasts the observable ones.
#[derive(Debug)]
pub struct PresenceTracker {
    /// Presence rows, one per user.
    store: Arc<dyn PresenceStore>,
    /// Global fan-out for `presence:changed`.
    dispatcher: Arc<EventDispatcher>,
}

impl PresenceTracker {
    /// Creates a tracker.
    pub fn new(store: Arc<dyn PresenceStore>, dispatcher: Arc<EventDispatcher>) -> Self {
        Self { store, dispatcher }
    }

    /// Registers one more live connection for a user.
    ///
    /// Broadcasts only the offline→online edge; further connections of
    /// the same user change nothing observable. An unexpired explicit
    /// override also suppresses the broadcast, since the stored status
    /// did not move.
    pub async fn connection_opened(&self, user_id: Uuid) -> AppResult<()> {
        let presence = self.store.connection_opened(user_id).await?;
        if presence.connections_count == 1 && !presence.has_active_override(Utc::now()) {
            self.dispatcher.broadcast_presence(changed(&presence)).await;
        }
        Ok(())
    }

    /// Registers one less live connection for a user.
    ///
    /// Broadcasts only when the store derived an offline transition:
    /// count reached zero and no override survived the disconnect.
    pub async fn connection_closed(&self, user_id: Uuid) -> AppResult<()> {
        let Some(presence) = self.store.connection_closed(user_id).await? else {
            return Ok(());
        };
        if presence.connections_count == 0 && presence.status == PresenceStatus::Offline {
            self.dispatcher.broadcast_presence(changed(&presence)).await;
        }
        Ok(())
    }

    /// Stores an explicit status override and broadcasts it.
    ///
    /// The override wins over automatic transitions until it expires,
    /// is replaced, or the user's last connection closes (an override
    /// with its own expiry survives that close until the expiry).
    pub async fn set_status(
        &self,
        user_id: Uuid,
        status: PresenceStatus,
        custom_status: Option<String>,
        custom_emoji: Option<String>,
        expires_in_seconds: Option<i64>,
    ) -> AppResult<Presence> {
        if let Some(seconds) = expires_in_seconds {
            if seconds <= 0 {
                return Err(AppError::validation("expires_in_seconds must be positive"));
            }
        }
        let expires_at = expires_in_seconds.map(|seconds| Utc::now() + Duration::seconds(seconds));

        let presence = self
            .store
            .set_status(
                user_id,
                status,
                custom_status.as_deref(),
                custom_emoji.as_deref(),
                expires_at,
            )
            .await?;

        self.dispatcher.broadcast_presence(changed(&presence)).await;
        Ok(presence)
    }

    /// Refreshes heartbeat timestamps; never touches status.
    pub async fn heartbeat(&self, user_id: Uuid) -> AppResult<()> {
        self.store.heartbeat(user_id).await
    }

    /// Clears lapsed overrides and broadcasts the restored statuses.
    ///
    /// Returns how many users changed. Reads derive the effective
    /// status themselves, so nothing is wrong between sweeps; the sweep
    /// exists so other clients hear about the change.
    pub async fn expire_overrides(&self) -> AppResult<usize> {
        let expired = self.store.expire_overrides().await?;
        let count = expired.len();
        for presence in expired {
            self.dispatcher.broadcast_presence(changed(&presence)).await;
        }
        Ok(count)
    }

    /// Users whose stored status is not offline, fleet-wide.
    pub async fn online_count(&self) -> AppResult<i64> {
        self.store.count_online().await
    }
}

/// Builds the broadcast event for a presence row.
fn changed(presence: &Presence) -> ServerMessage {
    ServerMessage::PresenceChanged {
        user_id: presence.user_id,
        status: presence.effective_status(Utc::now()),
        custom_status: presence.custom_status.clone(),
        custom_emoji: presence.custom_emoji.clone(),
    }
}
