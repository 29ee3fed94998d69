//! Fan-out bridge providers.

pub mod memory;
pub mod redis;

use std::sync::Arc;

use beacon_core::config::broker::BrokerConfig;
use beacon_core::error::AppError;
use beacon_core::result::AppResult;
use beacon_core::traits::bridge::FanoutBridge;

pub use self::memory::MemoryBridge;
pub use self::redis::RedisBridge;

/// Builds the configured fan-out bridge.
pub async fn init_bridge(config: &BrokerConfig) -> AppResult<Arc<dyn FanoutBridge>> {
    match config.provider.as_str() {
        "memory" => {
            tracing::info!("Initializing in-memory fan-out bridge (single instance)");
            Ok(Arc::new(MemoryBridge::new(config.memory.buffer_size)))
        }
        "redis" => Ok(Arc::new(RedisBridge::connect(&config.redis).await?)),
        other => Err(AppError::configuration(format!(
            "Unknown broker provider: '{other}'. Supported: memory, redis"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_provider_is_a_configuration_error() {
        let config = BrokerConfig {
            provider: "carrier-pigeon".to_string(),
            ..BrokerConfig::default()
        };
        let err = init_bridge(&config).await.unwrap_err();
        assert!(err.message.contains("carrier-pigeon"));
    }

    #[tokio::test]
    async fn memory_provider_initializes_without_io() {
        let bridge = init_bridge(&BrokerConfig::default()).await.unwrap();
        assert_eq!(bridge.provider_name(), "memory");
        assert!(bridge.health_check().await.unwrap());
    }
}
