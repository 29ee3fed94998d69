//! Fan-out broker configuration.

use serde::{Deserialize, Serialize};

/// Top-level broker configuration.
///
/// The broker carries events between server instances. A single-node
/// deployment can run entirely on the in-memory provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Broker provider type: `"memory"` or `"redis"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Redis-specific broker configuration.
    #[serde(default)]
    pub redis: RedisBrokerConfig,
    /// In-memory broker configuration.
    #[serde(default)]
    pub memory: MemoryBrokerConfig,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            redis: RedisBrokerConfig::default(),
            memory: MemoryBrokerConfig::default(),
        }
    }
}

/// Redis pub/sub broker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisBrokerConfig {
    /// Redis connection URL.
    #[serde(default = "default_redis_url")]
    pub url: String,
    /// Channel prefix for all Beacon pub/sub channels.
    #[serde(default = "default_channel_prefix")]
    pub channel_prefix: String,
    /// Delay before re-subscribing after a dropped pub/sub connection,
    /// in seconds.
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_seconds: u64,
}

impl Default for RedisBrokerConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            channel_prefix: default_channel_prefix(),
            reconnect_delay_seconds: default_reconnect_delay(),
        }
    }
}

/// In-memory broadcast broker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryBrokerConfig {
    /// Capacity of the broadcast channel before lagging subscribers
    /// start missing envelopes.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

impl Default for MemoryBrokerConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
        }
    }
}

fn default_provider() -> String {
    "memory".to_string()
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_channel_prefix() -> String {
    "beacon:".to_string()
}

fn default_reconnect_delay() -> u64 {
    2
}

fn default_buffer_size() -> usize {
    1024
}
