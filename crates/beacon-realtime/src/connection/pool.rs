//! Connection pool — all live connections on this instance.

use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use super::handle::{ConnectionHandle, ConnectionId};

/// Thread-safe registry of the instance's live WebSocket connections.
///
/// The user index covers authenticated connections only; anonymous
/// connections are reachable by id alone.
#[derive(Debug)]
pub struct ConnectionPool {
    /// Connection ID → handle.
    by_id: DashMap<ConnectionId, Arc<ConnectionHandle>>,
    /// User ID → that user's handles, oldest first.
    by_user: DashMap<Uuid, Vec<Arc<ConnectionHandle>>>,
}

impl ConnectionPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self {
            by_id: DashMap::new(),
            by_user: DashMap::new(),
        }
    }

    /// Adds a connection.
    pub fn add(&self, handle: Arc<ConnectionHandle>) {
        self.by_id.insert(handle.id, handle.clone());
        if let Some(user_id) = handle.user_id {
            self.by_user.entry(user_id).or_default().push(handle);
        }
    }

    /// Removes a connection, returning its handle if it was present.
    pub fn remove(&self, conn_id: &ConnectionId) -> Option<Arc<ConnectionHandle>> {
        let (_, handle) = self.by_id.remove(conn_id)?;
        if let Some(user_id) = handle.user_id {
            if let Some(mut connections) = self.by_user.get_mut(&user_id) {
                connections.retain(|c| c.id != *conn_id);
                if connections.is_empty() {
                    drop(connections);
                    self.by_user.remove(&user_id);
                }
            }
        }
        Some(handle)
    }

    /// Gets a connection by ID.
    pub fn get(&self, conn_id: &ConnectionId) -> Option<Arc<ConnectionHandle>> {
        self.by_id.get(conn_id).map(|entry| entry.value().clone())
    }

    /// All of a user's connections on this instance, oldest first.
    pub fn user_connections(&self, user_id: &Uuid) -> Vec<Arc<ConnectionHandle>> {
        self.by_user
            .get(user_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// All live handles.
    pub fn all(&self) -> Vec<Arc<ConnectionHandle>> {
        self.by_id
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Total connections on this instance.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Whether the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Unique authenticated users on this instance.
    pub fn user_count(&self) -> usize {
        self.by_user.len()
    }

    /// Connections without a resolved user.
    pub fn anonymous_count(&self) -> usize {
        self.by_id
            .iter()
            .filter(|entry| entry.value().user_id.is_none())
            .count()
    }
}

impl Default for ConnectionPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn handle(user_id: Option<Uuid>) -> Arc<ConnectionHandle> {
        let (tx, rx) = mpsc::channel(1);
        std::mem::forget(rx);
        Arc::new(ConnectionHandle::new(
            Uuid::new_v4(),
            user_id,
            None,
            None,
            None,
            tx,
        ))
    }

    #[tokio::test]
    async fn user_index_tracks_only_authenticated_connections() {
        let pool = ConnectionPool::new();
        let user = Uuid::new_v4();
        let first = handle(Some(user));
        let second = handle(Some(user));
        let anon = handle(None);

        pool.add(first.clone());
        pool.add(second.clone());
        pool.add(anon.clone());

        assert_eq!(pool.len(), 3);
        assert_eq!(pool.user_count(), 1);
        assert_eq!(pool.anonymous_count(), 1);
        assert_eq!(pool.user_connections(&user).len(), 2);

        pool.remove(&first.id);
        assert_eq!(pool.user_connections(&user).len(), 1);
        pool.remove(&second.id);
        assert!(pool.user_connections(&user).is_empty());
        assert_eq!(pool.user_count(), 0);
    }

    #[tokio::test]
    async fn oldest_connection_comes_first() {
        let pool = ConnectionPool::new();
        let user = Uuid::new_v4();
        let first = handle(Some(user));
        let second = handle(Some(user));
        pool.add(first.clone());
        pool.add(second);

        let connections = pool.user_connections(&user);
        assert_eq!(connections.first().map(|c| c.id), Some(first.id));
    }
}
