//! Subscription index — which rooms each connection is attached to.

use std::collections::HashSet;

use dashmap::DashMap;

use crate::connection::handle::ConnectionId;

/// Reverse index from connection to room names.
#[derive(Debug)]
pub struct SubscriptionIndex {
    /// Connection ID → set of room names.
    by_connection: DashMap<ConnectionId, HashSet<String>>,
}

impl SubscriptionIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self {
            by_connection: DashMap::new(),
        }
    }

    /// Records a subscription.
    pub fn add(&self, conn_id: ConnectionId, room: String) {
        self.by_connection.entry(conn_id).or_default().insert(room);
    }

    /// Removes a subscription.
    pub fn remove(&self, conn_id: ConnectionId, room: &str) {
        if let Some(mut rooms) = self.by_connection.get_mut(&conn_id) {
            rooms.remove(room);
        }
    }

    /// Returns all rooms a connection is attached to.
    pub fn rooms_of(&self, conn_id: ConnectionId) -> HashSet<String> {
        self.by_connection
            .get(&conn_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Drops every subscription for a connection, returning the rooms it held.
    pub fn remove_all(&self, conn_id: ConnectionId) -> HashSet<String> {
        self.by_connection
            .remove(&conn_id)
            .map(|(_, rooms)| rooms)
            .unwrap_or_default()
    }
}

impl Default for SubscriptionIndex {
    fn default() -> Self {
        Self::new()
    }
}
