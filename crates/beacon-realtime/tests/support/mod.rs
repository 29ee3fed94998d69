//! Shared in-memory doubles and helpers for integration tests.
//!
//! [`MemoryStores`] implements every store trait over mutex-guarded
//! collections, mirroring the Postgres repositories' per-call atomicity:
//! each method takes one lock for its whole read-modify-write.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use uuid::Uuid;

use beacon_core::config::realtime::RealtimeConfig;
use beacon_core::result::AppResult;
use beacon_core::traits::bridge::FanoutBridge;
use beacon_database::stores::{
    ConnectionStore, EventStore, MemberUpsert, PresenceStore, RoomMemberStore, RoomStore,
    TypingStore,
};
use beacon_entity::connection::{Connection, ConnectionStatus, CreateConnection};
use beacon_entity::event::{CreateEvent, Event};
use beacon_entity::presence::{Presence, PresenceStatus};
use beacon_entity::room::{CreateRoom, MemberRole, Room, RoomMember};
use beacon_entity::typing::TypingIndicator;
use beacon_entity::user::UserRole;
use beacon_realtime::bridge::MemoryBridge;
use beacon_realtime::connection::{AuthenticatedUser, ConnectionHandle, ConnectionManager};
use beacon_realtime::message::ServerMessage;
use beacon_realtime::{EngineStores, RealtimeEngine};

/// In-memory implementation of all six store traits.
#[derive(Debug, Default)]
pub struct MemoryStores {
    connections: Mutex<Vec<Connection>>,
    rooms: Mutex<Vec<Room>>,
    members: Mutex<Vec<RoomMember>>,
    presence: Mutex<HashMap<Uuid, Presence>>,
    typing: Mutex<Vec<TypingIndicator>>,
    events: Mutex<Vec<Event>>,
}

fn offline_row(user_id: Uuid, now: DateTime<Utc>) -> Presence {
    Presence {
        user_id,
        status: PresenceStatus::Offline,
        custom_status: None,
        custom_emoji: None,
        custom_expires_at: None,
        explicit_status: false,
        connections_count: 0,
        last_active_at: now,
        last_heartbeat_at: now,
        updated_at: now,
    }
}

#[async_trait]
impl ConnectionStore for MemoryStores {
    async fn create(&self, data: &CreateConnection) -> AppResult<Connection> {
        let now = Utc::now();
        let row = Connection {
            id: Uuid::new_v4(),
            user_id: data.user_id,
            session_id: data.session_id,
            status: ConnectionStatus::Connected,
            transport: data.transport.clone(),
            remote_addr: data.remote_addr.clone(),
            device_info: data.device_info.clone(),
            instance_id: data.instance_id,
            last_ping_at: now,
            last_pong_at: None,
            latency_ms: None,
            connected_at: now,
            disconnected_at: None,
        };
        self.connections.lock().unwrap().push(row.clone());
        Ok(row)
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Connection>> {
        Ok(self
            .connections
            .lock()
            .unwrap()
            .iter()
            .find(|row| row.id == id)
            .cloned())
    }

    async fn record_ping(&self, id: Uuid, latency_ms: Option<i32>) -> AppResult<()> {
        let now = Utc::now();
        if let Some(row) = self
            .connections
            .lock()
            .unwrap()
            .iter_mut()
            .find(|row| row.id == id)
        {
            row.last_ping_at = now;
            row.last_pong_at = Some(now);
            if latency_ms.is_some() {
                row.latency_ms = latency_ms;
            }
        }
        Ok(())
    }

    async fn mark_disconnected(&self, id: Uuid) -> AppResult<bool> {
        let mut connections = self.connections.lock().unwrap();
        let Some(row) = connections.iter_mut().find(|row| row.id == id) else {
            return Ok(false);
        };
        if row.status == ConnectionStatus::Disconnected {
            return Ok(false);
        }
        row.status = ConnectionStatus::Disconnected;
        row.disconnected_at = Some(Utc::now());
        Ok(true)
    }

    async fn find_live_by_user(&self, user_id: Uuid) -> AppResult<Vec<Connection>> {
        let mut rows: Vec<Connection> = self
            .connections
            .lock()
            .unwrap()
            .iter()
            .filter(|row| row.user_id == Some(user_id) && row.is_live())
            .cloned()
            .collect();
        rows.sort_by_key(|row| row.connected_at);
        Ok(rows)
    }

    async fn reap_instance(&self, instance_id: Uuid) -> AppResult<Vec<Connection>> {
        let now = Utc::now();
        let mut connections = self.connections.lock().unwrap();
        let mut reaped = Vec::new();
        for row in connections.iter_mut() {
            if row.instance_id == instance_id && row.is_live() {
                row.status = ConnectionStatus::Disconnected;
                row.disconnected_at = Some(now);
                reaped.push(row.clone());
            }
        }
        Ok(reaped)
    }

    async fn count_total(&self) -> AppResult<i64> {
        Ok(self.connections.lock().unwrap().len() as i64)
    }

    async fn count_live(&self) -> AppResult<i64> {
        Ok(self
            .connections
            .lock()
            .unwrap()
            .iter()
            .filter(|row| row.is_live())
            .count() as i64)
    }

    async fn count_live_authenticated(&self) -> AppResult<i64> {
        Ok(self
            .connections
            .lock()
            .unwrap()
            .iter()
            .filter(|row| row.is_live() && row.is_authenticated())
            .count() as i64)
    }
}

#[async_trait]
impl RoomStore for MemoryStores {
    async fn create(&self, data: &CreateRoom) -> AppResult<Room> {
        let now = Utc::now();
        let mut rooms = self.rooms.lock().unwrap();
        if let Some(room) = rooms.iter_mut().find(|room| room.name == data.name) {
            room.room_type = data.room_type;
            room.visibility = data.visibility;
            room.max_members = data.max_members;
            room.is_active = true;
            room.updated_at = now;
            return Ok(room.clone());
        }
        let room = Room {
            id: Uuid::new_v4(),
            name: data.name.clone(),
            room_type: data.room_type,
            visibility: data.visibility,
            max_members: data.max_members,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        rooms.push(room.clone());
        Ok(room)
    }

    async fn find_by_name(&self, name: &str) -> AppResult<Option<Room>> {
        Ok(self
            .rooms
            .lock()
            .unwrap()
            .iter()
            .find(|room| room.name == name)
            .cloned())
    }

    async fn count_active(&self) -> AppResult<i64> {
        Ok(self
            .rooms
            .lock()
            .unwrap()
            .iter()
            .filter(|room| room.is_active)
            .count() as i64)
    }
}

#[async_trait]
impl RoomMemberStore for MemoryStores {
    async fn upsert(
        &self,
        room_id: Uuid,
        user_id: Uuid,
        role: MemberRole,
    ) -> AppResult<MemberUpsert> {
        let now = Utc::now();
        let mut members = self.members.lock().unwrap();
        if let Some(member) = members
            .iter_mut()
            .find(|member| member.room_id == room_id && member.user_id == user_id)
        {
            member.last_seen_at = now;
            return Ok(MemberUpsert {
                member: member.clone(),
                newly_joined: false,
            });
        }
        let member = RoomMember {
            room_id,
            user_id,
            role,
            is_muted: false,
            is_banned: false,
            joined_at: now,
            last_seen_at: now,
        };
        members.push(member.clone());
        Ok(MemberUpsert {
            member,
            newly_joined: true,
        })
    }

    async fn delete(&self, room_id: Uuid, user_id: Uuid) -> AppResult<bool> {
        let mut members = self.members.lock().unwrap();
        let before = members.len();
        members.retain(|member| !(member.room_id == room_id && member.user_id == user_id));
        Ok(members.len() < before)
    }

    async fn count(&self, room_id: Uuid) -> AppResult<i64> {
        Ok(self
            .members
            .lock()
            .unwrap()
            .iter()
            .filter(|member| member.room_id == room_id)
            .count() as i64)
    }
}

#[async_trait]
impl PresenceStore for MemoryStores {
    async fn connection_opened(&self, user_id: Uuid) -> AppResult<Presence> {
        let now = Utc::now();
        let mut presence = self.presence.lock().unwrap();
        let row = presence
            .entry(user_id)
            .or_insert_with(|| offline_row(user_id, now));
        row.connections_count += 1;
        if !row.has_active_override(now) {
            row.status = PresenceStatus::Online;
        }
        row.last_active_at = now;
        row.last_heartbeat_at = now;
        row.updated_at = now;
        Ok(row.clone())
    }

    async fn connection_closed(&self, user_id: Uuid) -> AppResult<Option<Presence>> {
        let now = Utc::now();
        let mut presence = self.presence.lock().unwrap();
        let Some(row) = presence.get_mut(&user_id) else {
            return Ok(None);
        };
        row.connections_count = (row.connections_count - 1).max(0);
        if row.connections_count == 0 && !row.override_survives_disconnect(now) {
            row.status = PresenceStatus::Offline;
            row.explicit_status = false;
            row.custom_status = None;
            row.custom_emoji = None;
            row.custom_expires_at = None;
        }
        row.updated_at = now;
        Ok(Some(row.clone()))
    }

    async fn set_status(
        &self,
        user_id: Uuid,
        status: PresenceStatus,
        custom_status: Option<&str>,
        custom_emoji: Option<&str>,
        custom_expires_at: Option<DateTime<Utc>>,
    ) -> AppResult<Presence> {
        let now = Utc::now();
        let mut presence = self.presence.lock().unwrap();
        let row = presence
            .entry(user_id)
            .or_insert_with(|| offline_row(user_id, now));
        row.status = status;
        row.custom_status = custom_status.map(str::to_string);
        row.custom_emoji = custom_emoji.map(str::to_string);
        row.custom_expires_at = custom_expires_at;
        row.explicit_status = true;
        row.last_active_at = now;
        row.updated_at = now;
        Ok(row.clone())
    }

    async fn heartbeat(&self, user_id: Uuid) -> AppResult<()> {
        let now = Utc::now();
        if let Some(row) = self.presence.lock().unwrap().get_mut(&user_id) {
            row.last_heartbeat_at = now;
            row.last_active_at = now;
            row.updated_at = now;
        }
        Ok(())
    }

    async fn get(&self, user_id: Uuid) -> AppResult<Option<Presence>> {
        Ok(self.presence.lock().unwrap().get(&user_id).cloned())
    }

    async fn expire_overrides(&self) -> AppResult<Vec<Presence>> {
        let now = Utc::now();
        let mut changed = Vec::new();
        for row in self.presence.lock().unwrap().values_mut() {
            if row.explicit_status && row.custom_expires_at.is_some_and(|at| at <= now) {
                row.status = if row.connections_count > 0 {
                    PresenceStatus::Online
                } else {
                    PresenceStatus::Offline
                };
                row.explicit_status = false;
                row.custom_status = None;
                row.custom_emoji = None;
                row.custom_expires_at = None;
                row.updated_at = now;
                changed.push(row.clone());
            }
        }
        Ok(changed)
    }

    async fn count_online(&self) -> AppResult<i64> {
        Ok(self
            .presence
            .lock()
            .unwrap()
            .values()
            .filter(|row| row.status != PresenceStatus::Offline)
            .count() as i64)
    }
}

#[async_trait]
impl TypingStore for MemoryStores {
    async fn start(
        &self,
        room_id: Uuid,
        user_id: Uuid,
        thread_id: Option<Uuid>,
        ttl_seconds: i64,
    ) -> AppResult<TypingIndicator> {
        let now = Utc::now();
        let expires_at = now + chrono::Duration::seconds(ttl_seconds);
        let mut typing = self.typing.lock().unwrap();
        if let Some(row) = typing.iter_mut().find(|row| {
            row.room_id == room_id && row.user_id == user_id && row.thread_id == thread_id
        }) {
            row.expires_at = expires_at;
            return Ok(row.clone());
        }
        let row = TypingIndicator {
            room_id,
            user_id,
            thread_id,
            started_at: now,
            expires_at,
        };
        typing.push(row.clone());
        Ok(row)
    }

    async fn stop(&self, room_id: Uuid, user_id: Uuid, thread_id: Option<Uuid>) -> AppResult<bool> {
        let mut typing = self.typing.lock().unwrap();
        let before = typing.len();
        typing.retain(|row| {
            !(row.room_id == room_id && row.user_id == user_id && row.thread_id == thread_id)
        });
        Ok(typing.len() < before)
    }

    async fn current(
        &self,
        room_id: Uuid,
        thread_id: Option<Uuid>,
    ) -> AppResult<Vec<TypingIndicator>> {
        let now = Utc::now();
        let mut rows: Vec<TypingIndicator> = self
            .typing
            .lock()
            .unwrap()
            .iter()
            .filter(|row| {
                row.room_id == room_id && row.thread_id == thread_id && !row.is_expired(now)
            })
            .cloned()
            .collect();
        rows.sort_by_key(|row| row.started_at);
        Ok(rows)
    }

    async fn sweep(&self) -> AppResult<u64> {
        let now = Utc::now();
        let mut typing = self.typing.lock().unwrap();
        let before = typing.len();
        typing.retain(|row| !row.is_expired(now));
        Ok((before - typing.len()) as u64)
    }
}

#[async_trait]
impl EventStore for MemoryStores {
    async fn append(&self, data: &CreateEvent) -> AppResult<Event> {
        let row = Event {
            id: Uuid::new_v4(),
            event_type: data.event_type.clone(),
            connection_id: data.connection_id,
            user_id: data.user_id,
            room_id: data.room_id,
            payload: data.payload.clone(),
            remote_addr: data.remote_addr.clone(),
            created_at: Utc::now(),
        };
        self.events.lock().unwrap().push(row.clone());
        Ok(row)
    }

    async fn recent(&self, limit: i64) -> AppResult<Vec<Event>> {
        let events = self.events.lock().unwrap();
        Ok(events
            .iter()
            .rev()
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

/// Fresh empty stores.
pub fn stores() -> Arc<MemoryStores> {
    Arc::new(MemoryStores::default())
}

/// Wires an engine over the given stores and bridge.
pub fn build_engine(
    stores: &Arc<MemoryStores>,
    bridge: Arc<dyn FanoutBridge>,
    config: RealtimeConfig,
    instance_id: Uuid,
) -> Arc<RealtimeEngine> {
    let stores = EngineStores {
        connections: stores.clone(),
        rooms: stores.clone(),
        members: stores.clone(),
        presence: stores.clone(),
        typing: stores.clone(),
        events: stores.clone(),
    };
    RealtimeEngine::new(stores, bridge, config, instance_id)
}

/// An engine with default configuration and its own private bridge.
pub fn engine(stores: &Arc<MemoryStores>) -> Arc<RealtimeEngine> {
    build_engine(
        stores,
        Arc::new(MemoryBridge::new(64)),
        RealtimeConfig::default(),
        Uuid::new_v4(),
    )
}

/// An engine with the given configuration and its own private bridge.
pub fn engine_with_config(
    stores: &Arc<MemoryStores>,
    config: RealtimeConfig,
) -> Arc<RealtimeEngine> {
    build_engine(stores, Arc::new(MemoryBridge::new(64)), config, Uuid::new_v4())
}

/// A regular authenticated user.
pub fn user() -> AuthenticatedUser {
    AuthenticatedUser {
        user_id: Uuid::new_v4(),
        session_id: None,
        role: UserRole::User,
        username: None,
    }
}

/// An admin user.
pub fn admin() -> AuthenticatedUser {
    AuthenticatedUser {
        user_id: Uuid::new_v4(),
        session_id: None,
        role: UserRole::Admin,
        username: None,
    }
}

/// Accepts a connection and drains the handshake events.
///
/// Everything the accept produced (presence broadcast, `connected`,
/// `authenticated`) is already buffered when it returns, so the drain
/// leaves the receiver clean for the assertions that follow.
pub async fn connect(
    manager: &ConnectionManager,
    user: Option<AuthenticatedUser>,
) -> (Arc<ConnectionHandle>, mpsc::Receiver<ServerMessage>) {
    let (handle, mut rx) = manager
        .accept(user, Some("127.0.0.1:9".to_string()), None)
        .await
        .expect("accept failed");
    drain(&mut rx);
    (handle, rx)
}

/// Receives the next event, failing the test after one second.
pub async fn recv(rx: &mut mpsc::Receiver<ServerMessage>) -> ServerMessage {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("channel closed")
}

/// Drains every buffered event without waiting.
pub fn drain(rx: &mut mpsc::Receiver<ServerMessage>) -> Vec<ServerMessage> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Polls the event log until an entry of the given type appears.
pub async fn wait_for_event(stores: &MemoryStores, event_type: &str) -> Event {
    for _ in 0..100 {
        if let Some(event) = stores
            .events
            .lock()
            .unwrap()
            .iter()
            .find(|event| event.event_type == event_type)
            .cloned()
        {
            return event;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("no {event_type} event was logged");
}
