//! Authentication configuration.

use serde::{Deserialize, Serialize};

/// Token validation configuration for the WebSocket handshake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Secret key for JWT verification (HMAC-SHA256). When empty, tokens
    /// are decoded without signature verification (development only).
    #[serde(default)]
    pub jwt_secret: String,
    /// Clock-skew leeway for `exp`/`nbf` validation, in seconds.
    #[serde(default = "default_leeway")]
    pub jwt_leeway_seconds: u64,
    /// Whether connections without a token are accepted. Anonymous
    /// connections can ping but cannot join rooms or publish.
    #[serde(default = "default_true")]
    pub allow_anonymous: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            jwt_leeway_seconds: default_leeway(),
            allow_anonymous: default_true(),
        }
    }
}

fn default_leeway() -> u64 {
    30
}

fn default_true() -> bool {
    true
}
