//! Fan-out bridge trait for cross-instance event relay.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::result::AppResult;

/// The global scope carrying presence changes to every instance.
pub const PRESENCE_SCOPE: &str = "presence";

/// Scope name for a room, shared by local registries and the broker.
pub fn room_scope(room_name: &str) -> String {
    format!("room:{room_name}")
}

/// An envelope relayed between server instances through the broker.
///
/// `event` is the already-serialized server event; receiving instances
/// forward it verbatim to their local subscribers of `scope`. The
/// `origin` stamp lets instances drop their own envelopes, since local
/// delivery happens synchronously before the publish.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeEnvelope {
    /// Instance that produced the envelope.
    pub origin: Uuid,
    /// Delivery scope: `room:{name}` or the global `presence` scope.
    pub scope: String,
    /// Serialized server event payload.
    pub event: serde_json::Value,
    /// User to skip during delivery (the actor of the event).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_user: Option<Uuid>,
}

impl BridgeEnvelope {
    /// Create an envelope for a scope.
    pub fn new(origin: Uuid, scope: impl Into<String>, event: serde_json::Value) -> Self {
        Self {
            origin,
            scope: scope.into(),
            event,
            exclude_user: None,
        }
    }

    /// Exclude a user from remote delivery.
    pub fn excluding(mut self, user_id: Uuid) -> Self {
        self.exclude_user = Some(user_id);
        self
    }
}

/// Trait for fan-out brokers (Redis pub/sub or in-memory broadcast).
///
/// Publish ordering per scope must match publish-call order from a
/// single instance. Subscribers receive every envelope, including the
/// instance's own; filtering by `origin` is the caller's job.
#[async_trait]
pub trait FanoutBridge: Send + Sync + std::fmt::Debug + 'static {
    /// Publish an envelope to all instances.
    async fn publish(&self, envelope: &BridgeEnvelope) -> AppResult<()>;

    /// Subscribe to the stream of envelopes from all instances.
    fn subscribe(&self) -> broadcast::Receiver<BridgeEnvelope>;

    /// Check that the broker is reachable.
    async fn health_check(&self) -> AppResult<bool>;

    /// Short provider name for logs (`"redis"`, `"memory"`).
    fn provider_name(&self) -> &'static str;
}
