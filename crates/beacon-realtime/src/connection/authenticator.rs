//! Handshake authentication — validates the bearer token presented at accept.

use std::sync::atomic::{AtomicBool, Ordering};

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use beacon_core::config::auth::AuthConfig;
use beacon_core::error::AppError;
use beacon_core::result::AppResult;
use beacon_entity::user::UserRole;

/// JWT claims accepted on the handshake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject — the user id.
    pub sub: Uuid,
    /// Session id, when the issuer tracks sessions.
    #[serde(default)]
    pub sid: Option<Uuid>,
    /// Role granted by the issuer.
    #[serde(default)]
    pub role: UserRole,
    /// Display name; informational only.
    #[serde(default)]
    pub username: Option<String>,
    /// Issued-at, epoch seconds.
    pub iat: i64,
    /// Expiry, epoch seconds.
    pub exp: i64,
}

/// Identity resolved from a handshake credential.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// The user.
    pub user_id: Uuid,
    /// Session claim, if the token carried one.
    pub session_id: Option<Uuid>,
    /// Role from the token.
    pub role: UserRole,
    /// Display name from the token.
    pub username: Option<String>,
}

/// Validates handshake JWTs against the configured secret.
///
/// An empty secret switches to unverified decoding: claims are parsed
/// and expiry is still enforced, but the signature is not checked. For
/// development only, and logged loudly the first time it is used.
pub struct TokenAuthenticator {
    /// HMAC key for verification.
    decoding_key: DecodingKey,
    /// Validation parameters.
    validation: Validation,
    /// Whether signature verification is disabled.
    unverified: bool,
    /// Set once the unverified mode has been logged.
    unverified_warned: AtomicBool,
}

impl std::fmt::Debug for TokenAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAuthenticator")
            .field("unverified", &self.unverified)
            .finish()
    }
}

impl TokenAuthenticator {
    /// Creates an authenticator from auth configuration.
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = config.jwt_leeway_seconds;

        let unverified = config.jwt_secret.is_empty();
        if unverified {
            validation.insecure_disable_signature_validation();
        }

        Self {
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
            unverified,
            unverified_warned: AtomicBool::new(false),
        }
    }

    /// Validates a token and resolves the connecting identity.
    pub fn authenticate(&self, token: &str) -> AppResult<AuthenticatedUser> {
        if self.unverified && !self.unverified_warned.swap(true, Ordering::SeqCst) {
            tracing::warn!(
                "auth.jwt_secret is empty; accepting tokens WITHOUT signature verification \
                 (development mode)"
            );
        }

        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(
            |e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    AppError::authentication("Token has expired")
                }
                jsonwebtoken::errors::ErrorKind::InvalidToken => {
                    AppError::authentication("Invalid token format")
                }
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    AppError::authentication("Invalid token signature")
                }
                _ => AppError::authentication(format!("Token validation failed: {e}")),
            },
        )?;

        let claims = token_data.claims;
        Ok(AuthenticatedUser {
            user_id: claims.sub,
            session_id: claims.sid,
            role: claims.role,
            username: claims.username,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use jsonwebtoken::{EncodingKey, Header, encode};

    fn mint(secret: &str, claims: &Claims) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn claims_for(user_id: Uuid, ttl: Duration) -> Claims {
        let now = Utc::now();
        Claims {
            sub: user_id,
            sid: Some(Uuid::new_v4()),
            role: UserRole::User,
            username: Some("casey".to_string()),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        }
    }

    fn authenticator(secret: &str) -> TokenAuthenticator {
        TokenAuthenticator::new(&AuthConfig {
            jwt_secret: secret.to_string(),
            jwt_leeway_seconds: 0,
            allow_anonymous: true,
        })
    }

    #[test]
    fn valid_token_resolves_identity() {
        let user_id = Uuid::new_v4();
        let token = mint("topsecret", &claims_for(user_id, Duration::minutes(5)));

        let resolved = authenticator("topsecret").authenticate(&token).unwrap();
        assert_eq!(resolved.user_id, user_id);
        assert_eq!(resolved.role, UserRole::User);
        assert_eq!(resolved.username.as_deref(), Some("casey"));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = mint("one-secret", &claims_for(Uuid::new_v4(), Duration::minutes(5)));
        let err = authenticator("another-secret")
            .authenticate(&token)
            .unwrap_err();
        assert_eq!(err.message, "Invalid token signature");
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = mint("topsecret", &claims_for(Uuid::new_v4(), Duration::minutes(-5)));
        let err = authenticator("topsecret").authenticate(&token).unwrap_err();
        assert_eq!(err.message, "Token has expired");
    }

    #[test]
    fn garbage_token_is_rejected() {
        let err = authenticator("topsecret")
            .authenticate("not-a-jwt")
            .unwrap_err();
        assert_eq!(err.message, "Invalid token format");
    }

    #[test]
    fn empty_secret_accepts_foreign_signatures() {
        let user_id = Uuid::new_v4();
        let token = mint("whatever", &claims_for(user_id, Duration::minutes(5)));
        let resolved = authenticator("").authenticate(&token).unwrap();
        assert_eq!(resolved.user_id, user_id);
    }

    #[test]
    fn empty_secret_still_enforces_expiry() {
        let token = mint("whatever", &claims_for(Uuid::new_v4(), Duration::minutes(-5)));
        assert!(authenticator("").authenticate(&token).is_err());
    }
}
