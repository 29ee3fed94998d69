//! Typing engine — self-expiring typing indicators.

use std::sync::Arc;

use uuid::Uuid;

use beacon_core::error::AppError;
use beacon_core::result::AppResult;
use beacon_database::stores::{RoomStore, TypingStore};
use beacon_entity::room::Room;
use beacon_entity::typing::TypingIndicator;

use crate::dispatch::EventDispatcher;
use crate::message::{ServerMessage, Typist};

/// Maintains typing indicators and tells rooms about them.
///
/// Every broadcast carries the full unexpired typist list for the
/// room/thread, never a delta; a client can always replace its local
/// view wholesale. Indicators expire on their own after the TTL, and
/// clients drop them locally on the same clock, so the periodic sweep
/// deletes quietly.
#[derive(Debug)]
pub struct TypingEngine {
    /// Indicator rows.
    typing: Arc<dyn TypingStore>,
    /// Room name resolution.
    rooms: Arc<dyn RoomStore>,
    /// Room fan-out for `typing:event`.
    dispatcher: Arc<EventDispatcher>,
    /// Seconds an indicator lives without renewal.
    ttl_seconds: i64,
}

impl TypingEngine {
    /// Creates a typing engine.
    pub fn new(
        typing: Arc<dyn TypingStore>,
        rooms: Arc<dyn RoomStore>,
        dispatcher: Arc<EventDispatcher>,
        ttl_seconds: i64,
    ) -> Self {
        Self {
            typing,
            rooms,
            dispatcher,
            ttl_seconds,
        }
    }

    /// Starts (or renews) a typing indicator and notifies the room.
    pub async fn start(
        &self,
        room_name: &str,
        user_id: Uuid,
        thread_id: Option<Uuid>,
    ) -> AppResult<()> {
        let room = self.resolve_room(room_name).await?;
        self.typing
            .start(room.id, user_id, thread_id, self.ttl_seconds)
            .await?;
        self.broadcast(&room, user_id, thread_id).await
    }

    /// Stops a typing indicator and notifies the room.
    ///
    /// Stopping an indicator that never existed (or already lapsed and
    /// got swept) changes nothing, so nobody is notified.
    pub async fn stop(
        &self,
        room_name: &str,
        user_id: Uuid,
        thread_id: Option<Uuid>,
    ) -> AppResult<()> {
        let room = self.resolve_room(room_name).await?;
        let removed = self.typing.stop(room.id, user_id, thread_id).await?;
        if removed {
            self.broadcast(&room, user_id, thread_id).await?;
        }
        Ok(())
    }

    /// Unexpired typists for a room/thread, oldest first.
    pub async fn current_typists(
        &self,
        room_name: &str,
        thread_id: Option<Uuid>,
    ) -> AppResult<Vec<Typist>> {
        let room = self.resolve_room(room_name).await?;
        let indicators = self.typing.current(room.id, thread_id).await?;
        Ok(typists(indicators))
    }

    /// Deletes expired indicators. Returns how many went away.
    ///
    /// The sweep is garbage collection, not notification: reads filter
    /// on expiry themselves, and clients age indicators out locally.
    pub async fn sweep(&self) -> AppResult<u64> {
        self.typing.sweep().await
    }

    /// Sends the full typist list to the room, excluding the actor.
    async fn broadcast(&self, room: &Room, actor: Uuid, thread_id: Option<Uuid>) -> AppResult<()> {
        let indicators = self.typing.current(room.id, thread_id).await?;
        let event = ServerMessage::TypingEvent {
            room_name: room.name.clone(),
            thread_id,
            users: typists(indicators),
        };
        self.dispatcher
            .broadcast_room(&room.name, event, Some(actor))
            .await;
        Ok(())
    }

    async fn resolve_room(&self, room_name: &str) -> AppResult<Room> {
        match self.rooms.find_by_name(room_name).await? {
            Some(room) if room.is_active => Ok(room),
            _ => Err(AppError::not_found(format!("Room not found: {room_name}"))),
        }
    }
}

/// Projects indicator rows onto the wire shape.
fn typists(indicators: Vec<TypingIndicator>) -> Vec<Typist> {
    indicators
        .into_iter()
        .map(|indicator| Typist {
            user_id: indicator.user_id,
            started_at: indicator.started_at,
        })
        .collect()
}
