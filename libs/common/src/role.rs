//! Account roles
//!
//! Exactly two roles exist. Older clients also send `"user"`; whether that
//! name is accepted (as a customer) or refused is decided by [`RolePolicy`],
//! and every boundary that accepts a role string goes through
//! [`RolePolicy::parse`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role of an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Customer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Customer => "customer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned for a role name outside the accepted set
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid role specified: {0}")]
pub struct InvalidRole(pub String);

impl FromStr for Role {
    type Err = InvalidRole;

    /// Strict parse of the stored representation
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "customer" => Ok(Role::Customer),
            other => Err(InvalidRole(other.to_string())),
        }
    }
}

/// How role names coming from clients are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RolePolicy {
    /// Treat the legacy `"user"` role as `customer` instead of rejecting it
    pub legacy_user_as_customer: bool,
}

impl Default for RolePolicy {
    fn default() -> Self {
        Self {
            legacy_user_as_customer: true,
        }
    }
}

impl RolePolicy {
    /// Parse a client-supplied role name
    pub fn parse(&self, name: &str) -> Result<Role, InvalidRole> {
        let normalized = name.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "user" if self.legacy_user_as_customer => Ok(Role::Customer),
            other => other.parse(),
        }
    }
}
