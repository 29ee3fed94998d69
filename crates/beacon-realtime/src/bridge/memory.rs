//! In-memory fan-out bridge for single-instance deployments.

use async_trait::async_trait;
use tokio::sync::broadcast;

use beacon_core::result::AppResult;
use beacon_core::traits::bridge::{BridgeEnvelope, FanoutBridge};

/// Fan-out bridge backed by a process-local broadcast channel.
///
/// Envelopes never leave the process; with a single instance, that is
/// the whole cluster. Engine tests share one of these between two
/// engines to exercise cross-instance delivery.
#[derive(Debug)]
pub struct MemoryBridge {
    /// Envelope stream shared by all subscribers.
    events: broadcast::Sender<BridgeEnvelope>,
}

impl MemoryBridge {
    /// Creates a bridge with the given channel capacity.
    pub fn new(buffer_size: usize) -> Self {
        let (events, _) = broadcast::channel(buffer_size);
        Self { events }
    }
}

#[async_trait]
impl FanoutBridge for MemoryBridge {
    async fn publish(&self, envelope: &BridgeEnvelope) -> AppResult<()> {
        // No receiver just means no subscriber loop is running yet.
        let _ = self.events.send(envelope.clone());
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<BridgeEnvelope> {
        self.events.subscribe()
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }

    fn provider_name(&self) -> &'static str {
        "memory"
    }
}
