//! Presence repository implementation.
//!
//! Every count transition is one SQL statement that computes the new
//! count and the derived status together, so concurrent opens/closes for
//! the same user (browser tabs, reconnect races) cannot lose updates.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use beacon_core::error::{AppError, ErrorKind};
use beacon_core::result::AppResult;
use beacon_entity::presence::{Presence, PresenceStatus};

use crate::stores::PresenceStore;

/// Repository for aggregate presence rows.
#[derive(Debug, Clone)]
pub struct PresenceRepository {
    pool: PgPool,
}

impl PresenceRepository {
    /// Create a new presence repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PresenceStore for PresenceRepository {
    async fn connection_opened(&self, user_id: Uuid) -> AppResult<Presence> {
        // An unexpired explicit override keeps its status; otherwise any
        // live connection means online.
        sqlx::query_as::<_, Presence>(
            "INSERT INTO presence \
             (user_id, status, explicit_status, connections_count) \
             VALUES ($1, 'online'::presence_status, FALSE, 1) \
             ON CONFLICT (user_id) DO UPDATE SET \
                 connections_count = presence.connections_count + 1, \
                 status = CASE \
                     WHEN presence.explicit_status \
                          AND (presence.custom_expires_at IS NULL \
                               OR presence.custom_expires_at > NOW()) \
                     THEN presence.status \
                     ELSE 'online'::presence_status \
                 END, \
                 last_active_at = NOW(), \
                 last_heartbeat_at = NOW(), \
                 updated_at = NOW() \
             RETURNING *",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to open presence connection", e)
        })
    }

    async fn connection_closed(&self, user_id: Uuid) -> AppResult<Option<Presence>> {
        // Reaching zero forces offline and clears the override, except
        // when the override carries its own unexpired expiry.
        sqlx::query_as::<_, Presence>(
            "UPDATE presence SET \
                 connections_count = GREATEST(connections_count - 1, 0), \
                 status = CASE \
                     WHEN GREATEST(connections_count - 1, 0) > 0 THEN status \
                     WHEN explicit_status AND custom_expires_at IS NOT NULL \
                          AND custom_expires_at > NOW() THEN status \
                     ELSE 'offline'::presence_status \
                 END, \
                 explicit_status = CASE \
                     WHEN GREATEST(connections_count - 1, 0) = 0 \
                          AND NOT (explicit_status AND custom_expires_at IS NOT NULL \
                                   AND custom_expires_at > NOW()) \
                     THEN FALSE ELSE explicit_status \
                 END, \
                 custom_status = CASE \
                     WHEN GREATEST(connections_count - 1, 0) = 0 \
                          AND NOT (explicit_status AND custom_expires_at IS NOT NULL \
                                   AND custom_expires_at > NOW()) \
                     THEN NULL ELSE custom_status \
                 END, \
                 custom_emoji = CASE \
                     WHEN GREATEST(connections_count - 1, 0) = 0 \
                          AND NOT (explicit_status AND custom_expires_at IS NOT NULL \
                                   AND custom_expires_at > NOW()) \
                     THEN NULL ELSE custom_emoji \
                 END, \
                 custom_expires_at = CASE \
                     WHEN GREATEST(connections_count - 1, 0) = 0 \
                          AND NOT (explicit_status AND custom_expires_at IS NOT NULL \
                                   AND custom_expires_at > NOW()) \
                     THEN NULL ELSE custom_expires_at \
                 END, \
                 updated_at = NOW() \
             WHERE user_id = $1 \
             RETURNING *",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to close presence connection", e)
        })
    }

    async fn set_status(
        &self,
        user_id: Uuid,
        status: PresenceStatus,
        custom_status: Option<&str>,
        custom_emoji: Option<&str>,
        custom_expires_at: Option<DateTime<Utc>>,
    ) -> AppResult<Presence> {
        sqlx::query_as::<_, Presence>(
            "INSERT INTO presence \
             (user_id, status, custom_status, custom_emoji, custom_expires_at, \
              explicit_status, connections_count) \
             VALUES ($1, $2, $3, $4, $5, TRUE, 0) \
             ON CONFLICT (user_id) DO UPDATE SET \
                 status = EXCLUDED.status, \
                 custom_status = EXCLUDED.custom_status, \
                 custom_emoji = EXCLUDED.custom_emoji, \
                 custom_expires_at = EXCLUDED.custom_expires_at, \
                 explicit_status = TRUE, \
                 last_active_at = NOW(), \
                 updated_at = NOW() \
             RETURNING *",
        )
        .bind(user_id)
        .bind(status)
        .bind(custom_status)
        .bind(custom_emoji)
        .bind(custom_expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to set status", e))
    }

    async fn heartbeat(&self, user_id: Uuid) -> AppResult<()> {
        sqlx::query(
            "UPDATE presence SET last_heartbeat_at = NOW(), last_active_at = NOW(), \
             updated_at = NOW() WHERE user_id = $1",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to record presence heartbeat", e)
        })?;
        Ok(())
    }

    async fn get(&self, user_id: Uuid) -> AppResult<Option<Presence>> {
        sqlx::query_as::<_, Presence>("SELECT * FROM presence WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to get presence", e))
    }

    async fn expire_overrides(&self) -> AppResult<Vec<Presence>> {
        sqlx::query_as::<_, Presence>(
            "UPDATE presence SET \
                 status = CASE WHEN connections_count > 0 \
                     THEN 'online'::presence_status ELSE 'offline'::presence_status END, \
                 explicit_status = FALSE, \
                 custom_status = NULL, \
                 custom_emoji = NULL, \
                 custom_expires_at = NULL, \
                 updated_at = NOW() \
             WHERE explicit_status AND custom_expires_at IS NOT NULL \
             AND custom_expires_at <= NOW() \
             RETURNING *",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to expire status overrides", e)
        })
    }

    async fn count_online(&self) -> AppResult<i64> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM presence WHERE status <> 'offline'::presence_status",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to count online users", e)
        })
    }
}
