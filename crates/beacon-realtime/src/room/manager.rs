//! Room manager — membership of record plus local subscriptions.
//!
//! Ordering on every mutating path: datastore write first, local
//! registry second, notification last. A failed write leaves no local
//! trace, so an errored ack never has side effects behind it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use beacon_core::error::AppError;
use beacon_core::result::AppResult;
use beacon_core::types::Metadata;
use beacon_database::stores::{RoomMemberStore, RoomStore};
use beacon_entity::event::CreateEvent;
use beacon_entity::room::{CreateRoom, MemberRole, Room};

use crate::audit::EventLogger;
use crate::connection::handle::ConnectionHandle;
use crate::dispatch::EventDispatcher;
use crate::message::ServerMessage;

use super::registry::RoomRegistry;

/// Ack payload for a successful join.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinAck {
    /// The room joined.
    pub room_name: String,
    /// Members of record after the join.
    pub member_count: i64,
}

/// Coordinates room membership, local subscriptions, and room events.
#[derive(Debug)]
pub struct RoomManager {
    /// Room rows.
    rooms: Arc<dyn RoomStore>,
    /// Membership rows.
    members: Arc<dyn RoomMemberStore>,
    /// Local fan-out targets.
    registry: Arc<RoomRegistry>,
    /// Room-scoped broadcasting.
    dispatcher: Arc<EventDispatcher>,
    /// Lifecycle audit trail.
    audit: EventLogger,
}

impl RoomManager {
    /// Creates a room manager.
    pub fn new(
        rooms: Arc<dyn RoomStore>,
        members: Arc<dyn RoomMemberStore>,
        registry: Arc<RoomRegistry>,
        dispatcher: Arc<EventDispatcher>,
        audit: EventLogger,
    ) -> Self {
        Self {
            rooms,
            members,
            registry,
            dispatcher,
            audit,
        }
    }

    /// Creates a room, or reactivates and updates an existing one by name.
    pub async fn create_room(&self, data: &CreateRoom, actor: Option<Uuid>) -> AppResult<Room> {
        let room = self.rooms.create(data).await?;
        let mut event = CreateEvent::named("room.created").room(room.id);
        if let Some(user_id) = actor {
            event = event.user(user_id);
        }
        self.audit.log(event);
        Ok(room)
    }

    /// Joins a connection's user to a room.
    ///
    /// Admins joining a missing (or deactivated) room create it on the
    /// fly; everyone else gets `Room not found`. Re-joining is
    /// idempotent: the membership row is touched, the member count does
    /// not move, and nobody is re-notified.
    pub async fn join(&self, handle: &ConnectionHandle, room_name: &str) -> AppResult<JoinAck> {
        let Some(user_id) = handle.user_id else {
            return Err(AppError::authorization("Authentication required to join rooms"));
        };

        let (room, role) = match self.rooms.find_by_name(room_name).await? {
            Some(room) if room.is_active => (room, MemberRole::Member),
            _ if handle.is_admin() => {
                let room = self
                    .create_room(&CreateRoom::channel(room_name), Some(user_id))
                    .await?;
                (room, MemberRole::Admin)
            }
            _ => return Err(AppError::not_found(format!("Room not found: {room_name}"))),
        };

        let upsert = self.members.upsert(room.id, user_id, role).await?;
        self.registry.subscribe(room.name.clone(), handle.id);

        if upsert.newly_joined {
            self.dispatcher
                .broadcast_room(
                    &room.name,
                    ServerMessage::UserJoined {
                        room_name: room.name.clone(),
                        user_id,
                    },
                    Some(user_id),
                )
                .await;
            self.audit.log(
                CreateEvent::named("room.joined")
                    .connection(handle.id)
                    .user(user_id)
                    .room(room.id),
            );
        }

        let member_count = self.members.count(room.id).await?;
        Ok(JoinAck {
            room_name: room.name,
            member_count,
        })
    }

    /// Removes a connection's user from a room.
    ///
    /// Leaving a room the user never joined (or that does not exist) is
    /// a no-op; only an actual departure notifies the remaining members.
    pub async fn leave(&self, handle: &ConnectionHandle, room_name: &str) -> AppResult<()> {
        let Some(user_id) = handle.user_id else {
            return Err(AppError::authorization("Authentication required to leave rooms"));
        };

        let Some(room) = self.rooms.find_by_name(room_name).await? else {
            return Ok(());
        };

        let removed = self.members.delete(room.id, user_id).await?;
        self.registry.unsubscribe(&room.name, handle.id);

        if removed {
            self.dispatcher
                .broadcast_room(
                    &room.name,
                    ServerMessage::UserLeft {
                        room_name: room.name.clone(),
                        user_id,
                    },
                    Some(user_id),
                )
                .await;
            self.audit.log(
                CreateEvent::named("room.left")
                    .connection(handle.id)
                    .user(user_id)
                    .room(room.id),
            );
        }
        Ok(())
    }

    /// Publishes a message to a room.
    ///
    /// Membership is not re-validated; the room only has to exist. The
    /// server stamps the timestamp, the body passes through opaque and
    /// unpersisted, and the audit row records the send without it.
    pub async fn send_message(
        &self,
        handle: &ConnectionHandle,
        room_name: &str,
        content: String,
        thread_id: Option<Uuid>,
        metadata: Option<Metadata>,
    ) -> AppResult<DateTime<Utc>> {
        let Some(user_id) = handle.user_id else {
            return Err(AppError::authorization(
                "Authentication required to send messages",
            ));
        };

        let room = self
            .rooms
            .find_by_name(room_name)
            .await?
            .filter(|room| room.is_active)
            .ok_or_else(|| AppError::not_found(format!("Room not found: {room_name}")))?;

        let timestamp = Utc::now();
        let content_length = content.len();
        let event = ServerMessage::MessageNew {
            room_name: room.name.clone(),
            user_id,
            content,
            thread_id,
            timestamp,
            metadata: metadata.unwrap_or_default(),
        };
        self.dispatcher.broadcast_room(&room.name, event, None).await;

        self.audit.log(
            CreateEvent::named("message.sent")
                .connection(handle.id)
                .user(user_id)
                .room(room.id)
                .payload(serde_json::json!({
                    "content_length": content_length,
                    "thread_id": thread_id,
                })),
        );
        Ok(timestamp)
    }

    /// Active rooms fleet-wide.
    pub async fn active_room_count(&self) -> AppResult<i64> {
        self.rooms.count_active().await
    }
}
