//! Account model and credential payloads

use chrono::{DateTime, Utc};
use common::role::Role;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account as stored, including the password hash
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Sign-up payload. `role` may only name a customer role.
#[derive(Debug, Clone, Deserialize)]
pub struct SignUpRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_is_not_serialized() {
        let user = User {
            id: Uuid::new_v4(),
            name: "Jane Doe".to_string(),
            email: "jane@example.com".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            role: Role::Customer,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["role"], "customer");
        assert_eq!(json["email"], "jane@example.com");
    }
}
