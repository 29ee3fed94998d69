//! Client frame envelope: an operation plus an optional ack id.

use serde::{Deserialize, Serialize};

use super::types::ClientMessage;

/// A parsed client frame.
///
/// The optional `id` correlates the frame with its `ack`; frames
/// without an id are fire-and-forget, and their failures fall back to
/// the `error` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientEnvelope {
    /// Client-chosen request id for ack correlation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// The operation itself.
    #[serde(flatten)]
    pub op: ClientMessage,
}

impl ClientEnvelope {
    /// Parse a raw text frame.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
