//! User model as exposed by the API

use chrono::{DateTime, Utc};
use common::role::Role;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use uuid::Uuid;

use crate::error::StoreError;

/// User entity. The password hash never leaves the repository.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request for admin-issued account creation
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub role: String,
}

/// Partial user update
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
}

/// Validated update
#[derive(Debug, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
}

/// Account created by an admin together with its one-time password
#[derive(Debug, Serialize)]
pub struct CreatedUser {
    pub user: User,
    pub password: String,
}

pub fn validate_name(name: &str) -> Result<(), StoreError> {
    let len = name.trim().chars().count();
    if !(3..=50).contains(&len) {
        return Err(StoreError::Validation(
            "Name must be between 3 and 50 characters".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), StoreError> {
    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });

    if !regex.is_match(email.trim()) {
        return Err(StoreError::Validation(
            "Please provide a valid email".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_length_bounds() {
        assert!(validate_name("Al").is_err());
        assert!(validate_name("Ada").is_ok());
        assert!(validate_name(&"x".repeat(51)).is_err());
    }

    #[test]
    fn test_email_shape() {
        assert!(validate_email("ada.lovelace@example.com").is_ok());
        assert!(validate_email("ada@localhost").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("ada @example.com").is_err());
    }

    #[test]
    fn test_user_serializes_without_password() {
        let user = User {
            id: Uuid::new_v4(),
            name: "Ada Lovelace".to_string(),
            email: "ada.lovelace@example.com".to_string(),
            role: Role::Customer,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let value = serde_json::to_value(&user).unwrap();
        assert_eq!(value["role"], "customer");
        assert!(value.get("passwordHash").is_none());
        assert!(value.get("createdAt").is_some());
    }
}
