//! Room registry — local fan-out targets per room on this instance.
//!
//! Tracks which of this instance's connections are attached to which
//! rooms. Membership of record lives in the database; the registry only
//! answers "who gets a copy of this frame here, right now".

use std::collections::HashSet;

use dashmap::DashMap;

use crate::connection::handle::ConnectionId;

use super::subscription::SubscriptionIndex;

/// Registry of rooms with at least one local subscriber.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    /// Room name → subscribed connection IDs.
    rooms: DashMap<String, HashSet<ConnectionId>>,
    /// Reverse index for teardown.
    subscriptions: SubscriptionIndex,
}

impl RoomRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            subscriptions: SubscriptionIndex::new(),
        }
    }

    /// Attaches a connection to a room.
    pub fn subscribe(&self, room: String, conn_id: ConnectionId) {
        self.rooms
            .entry(room.clone())
            .or_default()
            .insert(conn_id);
        self.subscriptions.add(conn_id, room);
    }

    /// Detaches a connection from a room.
    pub fn unsubscribe(&self, room: &str, conn_id: ConnectionId) {
        if let Some(mut subscribers) = self.rooms.get_mut(room) {
            subscribers.remove(&conn_id);
            if subscribers.is_empty() {
                drop(subscribers);
                self.rooms.remove(room);
            }
        }
        self.subscriptions.remove(conn_id, room);
    }

    /// Detaches a connection from every room, returning the rooms it held.
    pub fn unsubscribe_all(&self, conn_id: ConnectionId) -> HashSet<String> {
        let rooms = self.subscriptions.remove_all(conn_id);
        for room in &rooms {
            if let Some(mut subscribers) = self.rooms.get_mut(room) {
                subscribers.remove(&conn_id);
                if subscribers.is_empty() {
                    drop(subscribers);
                    self.rooms.remove(room);
                }
            }
        }
        rooms
    }

    /// Returns the local subscribers of a room.
    pub fn subscribers(&self, room: &str) -> Vec<ConnectionId> {
        self.rooms
            .get(room)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Returns the rooms a connection is attached to.
    pub fn rooms_of(&self, conn_id: ConnectionId) -> HashSet<String> {
        self.subscriptions.rooms_of(conn_id)
    }

    /// Number of local subscribers in a room.
    pub fn subscriber_count(&self, room: &str) -> usize {
        self.rooms.get(room).map(|set| set.len()).unwrap_or(0)
    }

    /// Number of rooms with at least one local subscriber.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
