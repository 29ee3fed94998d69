//! Realtime engine configuration.

use serde::{Deserialize, Serialize};

/// Realtime (WebSocket) engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Maximum WebSocket connections per user. Exceeding the cap evicts
    /// the user's oldest connection.
    #[serde(default = "default_max_connections_per_user")]
    pub max_connections_per_user: usize,
    /// Per-connection outbound buffer size. Frames beyond this are
    /// dropped for that connection.
    #[serde(default = "default_send_buffer")]
    pub send_buffer_size: usize,
    /// Seconds without a client ping before a connection is reaped.
    #[serde(default = "default_heartbeat_timeout")]
    pub heartbeat_timeout_seconds: u64,
    /// Interval between reaper passes over the local connection pool.
    #[serde(default = "default_reaper_interval")]
    pub reaper_interval_seconds: u64,
    /// Lifetime of a typing indicator before it self-expires.
    #[serde(default = "default_typing_ttl")]
    pub typing_ttl_seconds: u64,
    /// Interval between sweeps that delete expired typing indicators.
    #[serde(default = "default_typing_sweep_interval")]
    pub typing_sweep_interval_seconds: u64,
    /// Interval between sweeps that clear expired custom presence statuses.
    #[serde(default = "default_presence_sweep_interval")]
    pub presence_sweep_interval_seconds: u64,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            max_connections_per_user: default_max_connections_per_user(),
            send_buffer_size: default_send_buffer(),
            heartbeat_timeout_seconds: default_heartbeat_timeout(),
            reaper_interval_seconds: default_reaper_interval(),
            typing_ttl_seconds: default_typing_ttl(),
            typing_sweep_interval_seconds: default_typing_sweep_interval(),
            presence_sweep_interval_seconds: default_presence_sweep_interval(),
        }
    }
}

fn default_max_connections_per_user() -> usize {
    5
}

fn default_send_buffer() -> usize {
    256
}

fn default_heartbeat_timeout() -> u64 {
    60
}

fn default_reaper_interval() -> u64 {
    10
}

fn default_typing_ttl() -> u64 {
    3
}

fn default_typing_sweep_interval() -> u64 {
    10
}

fn default_presence_sweep_interval() -> u64 {
    30
}
