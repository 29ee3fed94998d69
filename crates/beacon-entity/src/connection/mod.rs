//! Connection domain entities.

pub mod model;

pub use model::{Connection, CreateConnection};

use serde::{Deserialize, Serialize};

/// Lifecycle status of a WebSocket connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "connection_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// Handshake accepted, registration in progress.
    Connecting,
    /// Fully registered and exchanging frames.
    Connected,
    /// Teardown in progress.
    Disconnecting,
    /// Closed; the row is retained for diagnosis.
    Disconnected,
}

impl ConnectionStatus {
    /// Check whether the connection still counts as live.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }

    /// Return the status as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnecting => "disconnecting",
            Self::Disconnected => "disconnected",
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ConnectionStatus {
    type Err = beacon_core::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "connecting" => Ok(Self::Connecting),
            "connected" => Ok(Self::Connected),
            "disconnecting" => Ok(Self::Disconnecting),
            "disconnected" => Ok(Self::Disconnected),
            _ => Err(beacon_core::AppError::validation(format!(
                "Invalid connection status: '{s}'"
            ))),
        }
    }
}
