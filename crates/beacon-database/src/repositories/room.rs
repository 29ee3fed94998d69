//! Room repository implementation.

use async_trait::async_trait;
use sqlx::PgPool;

use beacon_core::error::{AppError, ErrorKind};
use beacon_core::result::AppResult;
use beacon_entity::room::{CreateRoom, Room};

use crate::stores::RoomStore;

/// Repository for room CRUD and lookups.
#[derive(Debug, Clone)]
pub struct RoomRepository {
    pool: PgPool,
}

impl RoomRepository {
    /// Create a new room repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoomStore for RoomRepository {
    async fn create(&self, data: &CreateRoom) -> AppResult<Room> {
        // The unique name is the conflict target, so concurrent creates
        // converge on one row and re-creation reactivates a soft-deleted
        // room.
        sqlx::query_as::<_, Room>(
            "INSERT INTO rooms (name, room_type, visibility, max_members, is_active) \
             VALUES ($1, $2, $3, $4, TRUE) \
             ON CONFLICT (name) DO UPDATE SET \
                 room_type = EXCLUDED.room_type, \
                 visibility = EXCLUDED.visibility, \
                 max_members = EXCLUDED.max_members, \
                 is_active = TRUE, \
                 updated_at = NOW() \
             RETURNING *",
        )
        .bind(&data.name)
        .bind(data.room_type)
        .bind(data.visibility)
        .bind(data.max_members)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to create room", e))
    }

    async fn find_by_name(&self, name: &str) -> AppResult<Option<Room>> {
        sqlx::query_as::<_, Room>("SELECT * FROM rooms WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find room", e))
    }

    async fn count_active(&self) -> AppResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM rooms WHERE is_active")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count rooms", e))
    }
}
