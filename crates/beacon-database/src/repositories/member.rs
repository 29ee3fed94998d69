//! Room membership repository implementation.

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use beacon_core::error::{AppError, ErrorKind};
use beacon_core::result::AppResult;
use beacon_entity::room::{MemberRole, RoomMember};

use crate::stores::{MemberUpsert, RoomMemberStore};

/// Repository for room membership rows.
#[derive(Debug, Clone)]
pub struct RoomMemberRepository {
    pool: PgPool,
}

impl RoomMemberRepository {
    /// Create a new membership repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Row shape for the upsert: the member plus an inserted-or-updated flag.
#[derive(Debug, FromRow)]
struct MemberUpsertRow {
    #[sqlx(flatten)]
    member: RoomMember,
    newly_joined: bool,
}

#[async_trait]
impl RoomMemberStore for RoomMemberRepository {
    async fn upsert(
        &self,
        room_id: Uuid,
        user_id: Uuid,
        role: MemberRole,
    ) -> AppResult<MemberUpsert> {
        // `xmax = 0` is true only for freshly inserted rows, which is how
        // a first join is told apart from an idempotent re-join.
        let row = sqlx::query_as::<_, MemberUpsertRow>(
            "INSERT INTO room_members (room_id, user_id, role) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (room_id, user_id) DO UPDATE SET last_seen_at = NOW() \
             RETURNING *, (xmax = 0) AS newly_joined",
        )
        .bind(room_id)
        .bind(user_id)
        .bind(role)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to upsert member", e))?;

        Ok(MemberUpsert {
            member: row.member,
            newly_joined: row.newly_joined,
        })
    }

    async fn delete(&self, room_id: Uuid, user_id: Uuid) -> AppResult<bool> {
        let result =
            sqlx::query("DELETE FROM room_members WHERE room_id = $1 AND user_id = $2")
                .bind(room_id)
                .bind(user_id)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    AppError::with_source(ErrorKind::Database, "Failed to delete member", e)
                })?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self, room_id: Uuid) -> AppResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM room_members WHERE room_id = $1")
            .bind(room_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count members", e))
    }
}
