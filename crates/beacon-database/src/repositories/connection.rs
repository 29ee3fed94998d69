//! Connection repository implementation.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use beacon_core::error::{AppError, ErrorKind};
use beacon_core::result::AppResult;
use beacon_entity::connection::{Connection, CreateConnection};

use crate::stores::ConnectionStore;

/// Repository for connection row lifecycle and queries.
#[derive(Debug, Clone)]
pub struct ConnectionRepository {
    pool: PgPool,
}

impl ConnectionRepository {
    /// Create a new connection repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConnectionStore for ConnectionRepository {
    async fn create(&self, data: &CreateConnection) -> AppResult<Connection> {
        sqlx::query_as::<_, Connection>(
            "INSERT INTO connections \
             (user_id, session_id, status, transport, remote_addr, device_info, instance_id) \
             VALUES ($1, $2, 'connected'::connection_status, $3, $4, $5, $6) RETURNING *",
        )
        .bind(data.user_id)
        .bind(data.session_id)
        .bind(&data.transport)
        .bind(&data.remote_addr)
        .bind(&data.device_info)
        .bind(data.instance_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to create connection", e))
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Connection>> {
        sqlx::query_as::<_, Connection>("SELECT * FROM connections WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to find connection", e)
            })
    }

    async fn record_ping(&self, id: Uuid, latency_ms: Option<i32>) -> AppResult<()> {
        sqlx::query(
            "UPDATE connections SET last_ping_at = NOW(), last_pong_at = NOW(), \
             latency_ms = COALESCE($2, latency_ms) WHERE id = $1",
        )
        .bind(id)
        .bind(latency_ms)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to record ping", e))?;
        Ok(())
    }

    async fn mark_disconnected(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE connections SET status = 'disconnected'::connection_status, \
             disconnected_at = NOW() \
             WHERE id = $1 AND status <> 'disconnected'::connection_status",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to mark connection disconnected", e)
        })?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_live_by_user(&self, user_id: Uuid) -> AppResult<Vec<Connection>> {
        sqlx::query_as::<_, Connection>(
            "SELECT * FROM connections WHERE user_id = $1 \
             AND status IN ('connecting'::connection_status, 'connected'::connection_status) \
             ORDER BY connected_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to find live connections", e)
        })
    }

    async fn reap_instance(&self, instance_id: Uuid) -> AppResult<Vec<Connection>> {
        sqlx::query_as::<_, Connection>(
            "UPDATE connections SET status = 'disconnected'::connection_status, \
             disconnected_at = NOW() \
             WHERE instance_id = $1 \
             AND status IN ('connecting'::connection_status, 'connected'::connection_status) \
             RETURNING *",
        )
        .bind(instance_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to reap instance connections", e)
        })
    }

    async fn count_total(&self) -> AppResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM connections")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to count connections", e)
            })
    }

    async fn count_live(&self) -> AppResult<i64> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM connections \
             WHERE status IN ('connecting'::connection_status, 'connected'::connection_status)",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to count live connections", e)
        })
    }

    async fn count_live_authenticated(&self) -> AppResult<i64> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM connections WHERE user_id IS NOT NULL \
             AND status IN ('connecting'::connection_status, 'connected'::connection_status)",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::Database,
                "Failed to count authenticated connections",
                e,
            )
        })
    }
}
