//! Typing indicator repository implementation.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use beacon_core::error::{AppError, ErrorKind};
use beacon_core::result::AppResult;
use beacon_entity::typing::TypingIndicator;

use crate::stores::TypingStore;

/// Repository for self-expiring typing indicators.
#[derive(Debug, Clone)]
pub struct TypingRepository {
    pool: PgPool,
}

impl TypingRepository {
    /// Create a new typing repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TypingStore for TypingRepository {
    async fn start(
        &self,
        room_id: Uuid,
        user_id: Uuid,
        thread_id: Option<Uuid>,
        ttl_seconds: i64,
    ) -> AppResult<TypingIndicator> {
        // The conflict target matches the unique expression index that
        // folds NULL threads onto the zero UUID; renewals only push
        // expires_at forward.
        sqlx::query_as::<_, TypingIndicator>(
            "INSERT INTO typing_indicators (room_id, user_id, thread_id, expires_at) \
             VALUES ($1, $2, $3, NOW() + $4 * INTERVAL '1 second') \
             ON CONFLICT (room_id, user_id, \
                          COALESCE(thread_id, '00000000-0000-0000-0000-000000000000'::uuid)) \
             DO UPDATE SET expires_at = EXCLUDED.expires_at \
             RETURNING *",
        )
        .bind(room_id)
        .bind(user_id)
        .bind(thread_id)
        .bind(ttl_seconds)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to start typing", e))
    }

    async fn stop(&self, room_id: Uuid, user_id: Uuid, thread_id: Option<Uuid>) -> AppResult<bool> {
        let result = sqlx::query(
            "DELETE FROM typing_indicators \
             WHERE room_id = $1 AND user_id = $2 AND thread_id IS NOT DISTINCT FROM $3",
        )
        .bind(room_id)
        .bind(user_id)
        .bind(thread_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to stop typing", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn current(
        &self,
        room_id: Uuid,
        thread_id: Option<Uuid>,
    ) -> AppResult<Vec<TypingIndicator>> {
        sqlx::query_as::<_, TypingIndicator>(
            "SELECT * FROM typing_indicators \
             WHERE room_id = $1 AND thread_id IS NOT DISTINCT FROM $2 \
             AND expires_at > NOW() \
             ORDER BY started_at ASC",
        )
        .bind(room_id)
        .bind(thread_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list typists", e))
    }

    async fn sweep(&self) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM typing_indicators WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to sweep typing indicators", e)
            })?;
        Ok(result.rows_affected())
    }
}
