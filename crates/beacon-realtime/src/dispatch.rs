//! Event dispatch — local fan-out plus cross-instance relay.
//!
//! Every broadcast delivers to this instance's subscribers first, then
//! publishes the envelope to the bridge for the other instances. The
//! subscriber loop feeds received envelopes back through
//! [`EventDispatcher::deliver_remote`], which drops our own echoes.

use std::sync::Arc;

use uuid::Uuid;

use beacon_core::traits::bridge::{BridgeEnvelope, FanoutBridge, PRESENCE_SCOPE, room_scope};

use crate::connection::handle::ConnectionHandle;
use crate::connection::pool::ConnectionPool;
use crate::message::ServerMessage;
use crate::metrics::EngineMetrics;
use crate::room::registry::RoomRegistry;

/// Routes server events to local connections and remote instances.
#[derive(Debug)]
pub struct EventDispatcher {
    /// All live connections on this instance.
    pool: Arc<ConnectionPool>,
    /// Local room subscriptions.
    rooms: Arc<RoomRegistry>,
    /// Cross-instance relay.
    bridge: Arc<dyn FanoutBridge>,
    /// Engine counters.
    metrics: Arc<EngineMetrics>,
    /// This instance's identity, stamped on outgoing envelopes.
    instance_id: Uuid,
}

impl EventDispatcher {
    /// Creates a dispatcher.
    pub fn new(
        pool: Arc<ConnectionPool>,
        rooms: Arc<RoomRegistry>,
        bridge: Arc<dyn FanoutBridge>,
        metrics: Arc<EngineMetrics>,
        instance_id: Uuid,
    ) -> Self {
        Self {
            pool,
            rooms,
            bridge,
            metrics,
            instance_id,
        }
    }

    /// Broadcasts an event to a room, here and on every other instance.
    ///
    /// `exclude_user` skips all of that user's connections; used for
    /// events the actor already learns through an ack.
    pub async fn broadcast_room(
        &self,
        room: &str,
        event: ServerMessage,
        exclude_user: Option<Uuid>,
    ) {
        for conn_id in self.rooms.subscribers(room) {
            if let Some(handle) = self.pool.get(&conn_id) {
                self.deliver(&handle, &event, exclude_user);
            }
        }
        self.publish(room_scope(room), &event, exclude_user).await;
    }

    /// Broadcasts a presence change to every connection on every instance.
    pub async fn broadcast_presence(&self, event: ServerMessage) {
        for handle in self.pool.all() {
            self.deliver(&handle, &event, None);
        }
        self.publish(PRESENCE_SCOPE.to_string(), &event, None).await;
    }

    /// Forwards an envelope received from another instance to local
    /// subscribers of its scope. Envelopes stamped with our own
    /// instance id are dropped: local delivery already happened before
    /// the publish.
    pub fn deliver_remote(&self, envelope: BridgeEnvelope) {
        if envelope.origin == self.instance_id {
            return;
        }
        self.metrics.record_bridge_received();

        let event: ServerMessage = match serde_json::from_value(envelope.event) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(
                    scope = %envelope.scope,
                    origin = %envelope.origin,
                    "Dropping undecodable bridge envelope: {e}"
                );
                return;
            }
        };

        if envelope.scope == PRESENCE_SCOPE {
            for handle in self.pool.all() {
                self.deliver(&handle, &event, envelope.exclude_user);
            }
        } else if let Some(room) = envelope.scope.strip_prefix("room:") {
            for conn_id in self.rooms.subscribers(room) {
                if let Some(handle) = self.pool.get(&conn_id) {
                    self.deliver(&handle, &event, envelope.exclude_user);
                }
            }
        } else {
            tracing::warn!(scope = %envelope.scope, "Ignoring envelope with unknown scope");
        }
    }

    /// Sends one event to one connection, honoring the exclusion.
    fn deliver(
        &self,
        handle: &ConnectionHandle,
        event: &ServerMessage,
        exclude_user: Option<Uuid>,
    ) {
        if exclude_user.is_some() && handle.user_id == exclude_user {
            return;
        }
        if handle.send(event.clone()) {
            self.metrics.record_sent();
        } else {
            self.metrics.record_dropped();
        }
    }

    /// Publishes an event to the bridge for the other instances.
    async fn publish(&self, scope: String, event: &ServerMessage, exclude_user: Option<Uuid>) {
        let payload = match serde_json::to_value(event) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(scope = %scope, "Failed to serialize event for bridge: {e}");
                return;
            }
        };

        let mut envelope = BridgeEnvelope::new(self.instance_id, scope, payload);
        if let Some(user_id) = exclude_user {
            envelope = envelope.excluding(user_id);
        }

        match self.bridge.publish(&envelope).await {
            Ok(()) => self.metrics.record_bridge_published(),
            // Local subscribers were already served; remote delivery is lost
            // until the broker recovers.
            Err(e) => tracing::warn!(
                scope = %envelope.scope,
                provider = self.bridge.provider_name(),
                "Bridge publish failed: {e}"
            ),
        }
    }
}
