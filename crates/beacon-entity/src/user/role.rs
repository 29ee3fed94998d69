//! User role enumeration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Platform-wide roles carried in token claims.
///
/// Roles are ordered by privilege level: Admin > Moderator > User > Guest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Full platform administrator.
    Admin,
    /// Can moderate rooms across the platform.
    Moderator,
    /// Regular authenticated user.
    User,
    /// Limited guest account.
    Guest,
}

impl UserRole {
    /// Return the privilege level (higher = more privileged).
    pub fn privilege_level(&self) -> u8 {
        match self {
            Self::Admin => 4,
            Self::Moderator => 3,
            Self::User => 2,
            Self::Guest => 1,
        }
    }

    /// Check if this role has at least the given role's privileges.
    pub fn has_at_least(&self, other: &UserRole) -> bool {
        self.privilege_level() >= other.privilege_level()
    }

    /// Check if this role is an admin.
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }

    /// Return the role as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Moderator => "moderator",
            Self::User => "user",
            Self::Guest => "guest",
        }
    }
}

impl Default for UserRole {
    fn default() -> Self {
        Self::User
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = beacon_core::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "moderator" => Ok(Self::Moderator),
            "user" => Ok(Self::User),
            "guest" => Ok(Self::Guest),
            _ => Err(beacon_core::AppError::validation(format!(
                "Invalid user role: '{s}'. Expected one of: admin, moderator, user, guest"
            ))),
        }
    }
}
