//! Presence domain entities.

pub mod model;

pub use model::Presence;

use serde::{Deserialize, Serialize};

/// Aggregate presence status for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "presence_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    /// At least one live connection.
    Online,
    /// Temporarily inactive.
    Away,
    /// Do not disturb.
    Busy,
    /// No live connections.
    Offline,
}

impl PresenceStatus {
    /// Check if the user is considered reachable.
    pub fn is_online(&self) -> bool {
        !matches!(self, Self::Offline)
    }

    /// Return the status as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Away => "away",
            Self::Busy => "busy",
            Self::Offline => "offline",
        }
    }
}

impl std::fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PresenceStatus {
    type Err = beacon_core::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "online" => Ok(Self::Online),
            "away" => Ok(Self::Away),
            "busy" => Ok(Self::Busy),
            "offline" => Ok(Self::Offline),
            _ => Err(beacon_core::AppError::validation(format!(
                "Invalid presence status: '{s}'. Expected one of: online, away, busy, offline"
            ))),
        }
    }
}
