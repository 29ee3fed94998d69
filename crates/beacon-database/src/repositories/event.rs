//! Event log repository implementation.

use async_trait::async_trait;
use sqlx::PgPool;

use beacon_core::error::{AppError, ErrorKind};
use beacon_core::result::AppResult;
use beacon_entity::event::{CreateEvent, Event};

use crate::stores::EventStore;

/// Repository for the append-only event log.
#[derive(Debug, Clone)]
pub struct EventRepository {
    pool: PgPool,
}

impl EventRepository {
    /// Create a new event repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventStore for EventRepository {
    async fn append(&self, data: &CreateEvent) -> AppResult<Event> {
        sqlx::query_as::<_, Event>(
            "INSERT INTO events \
             (event_type, connection_id, user_id, room_id, payload, remote_addr) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
        )
        .bind(&data.event_type)
        .bind(data.connection_id)
        .bind(data.user_id)
        .bind(data.room_id)
        .bind(&data.payload)
        .bind(&data.remote_addr)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to append event", e))
    }

    async fn recent(&self, limit: i64) -> AppResult<Vec<Event>> {
        sqlx::query_as::<_, Event>(
            "SELECT * FROM events ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list recent events", e))
    }
}
