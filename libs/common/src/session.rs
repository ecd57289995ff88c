//! Session tokens
//!
//! A session is an HS256 JWT carrying the account id and role. The auth
//! service issues it, both services verify it, and sign-out revokes it by
//! writing it into Redis for the rest of its lifetime.

use anyhow::Result;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::cache::RedisPool;
use crate::role::Role;

/// Name of the cookie carrying the session token
pub const SESSION_COOKIE: &str = "token";

/// Session token configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Shared HMAC secret
    pub secret: String,
    /// Token lifetime in seconds (default: 1 day)
    pub ttl_seconds: u64,
}

impl SessionConfig {
    /// Create a new SessionConfig from environment variables
    ///
    /// # Environment Variables
    /// - `SESSION_SECRET`: HMAC secret used to sign tokens (required)
    /// - `SESSION_TTL_SECONDS`: Token lifetime in seconds (default: 86400)
    pub fn from_env() -> Result<Self> {
        let secret = std::env::var("SESSION_SECRET")
            .map_err(|_| anyhow::anyhow!("SESSION_SECRET environment variable not set"))?;

        if secret.trim().is_empty() {
            anyhow::bail!("SESSION_SECRET must not be empty");
        }

        let ttl_seconds = match std::env::var("SESSION_TTL_SECONDS") {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|ttl| *ttl > 0)
                .ok_or_else(|| {
                    anyhow::anyhow!("SESSION_TTL_SECONDS must be a positive integer, got {raw:?}")
                })?,
            Err(_) => 86400,
        };

        Ok(SessionConfig {
            secret,
            ttl_seconds,
        })
    }
}

/// Session token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Account id
    pub sub: Uuid,
    /// Account role at issue time
    pub role: Role,
    /// Issued at time
    pub iat: u64,
    /// Expiration time
    pub exp: u64,
}

impl Claims {
    /// Seconds left before the token expires
    pub fn remaining_seconds(&self) -> u64 {
        self.exp.saturating_sub(now_seconds())
    }
}

/// Signs and verifies session tokens
#[derive(Clone)]
pub struct SessionTokens {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl_seconds: u64,
}

impl SessionTokens {
    pub fn new(config: &SessionConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        SessionTokens {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            ttl_seconds: config.ttl_seconds,
        }
    }

    /// Issue a token for an account
    pub fn issue(&self, user_id: Uuid, role: Role) -> Result<String> {
        let now = now_seconds();
        let claims = Claims {
            sub: user_id,
            role,
            iat: now,
            exp: now + self.ttl_seconds,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;
        Ok(token)
    }

    /// Validate a token's signature and expiry and return its claims
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Ok(token_data.claims)
    }

    /// Token lifetime in seconds
    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }
}

fn revoked_key(token: &str) -> String {
    format!("revoked_session:{}", token)
}

/// Mark a token as revoked until it would have expired
pub async fn revoke(redis_pool: &RedisPool, token: &str, claims: &Claims) -> Result<()> {
    redis_pool
        .set(&revoked_key(token), "1", Some(claims.remaining_seconds()))
        .await
}

/// Whether a token has been revoked by sign-out
pub async fn is_revoked(redis_pool: &RedisPool, token: &str) -> Result<bool> {
    redis_pool.exists(&revoked_key(token)).await
}

fn now_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn tokens(secret: &str, ttl_seconds: u64) -> SessionTokens {
        SessionTokens::new(&SessionConfig {
            secret: secret.to_string(),
            ttl_seconds,
        })
    }

    #[test]
    fn test_issue_and_verify() -> Result<()> {
        let tokens = tokens("test-secret", 60);
        let user_id = Uuid::new_v4();

        let token = tokens.issue(user_id, Role::Customer)?;
        let claims = tokens.verify(&token)?;

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.role, Role::Customer);
        assert_eq!(claims.exp - claims.iat, 60);
        assert!(claims.remaining_seconds() <= 60);
        Ok(())
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() -> Result<()> {
        let token = tokens("secret-a", 60).issue(Uuid::new_v4(), Role::Admin)?;
        assert!(tokens("secret-b", 60).verify(&token).is_err());
        Ok(())
    }

    #[test]
    fn test_expired_token_is_rejected() -> Result<()> {
        let token = tokens("test-secret", 0).issue(Uuid::new_v4(), Role::Admin)?;
        std::thread::sleep(std::time::Duration::from_millis(1100));
        assert!(tokens("test-secret", 0).verify(&token).is_err());
        Ok(())
    }

    #[test]
    #[serial]
    fn test_session_config_requires_secret() {
        unsafe {
            std::env::remove_var("SESSION_SECRET");
        }
        assert!(SessionConfig::from_env().is_err());

        unsafe {
            std::env::set_var("SESSION_SECRET", "abc");
            std::env::remove_var("SESSION_TTL_SECONDS");
        }
        let config = SessionConfig::from_env().unwrap();
        assert_eq!(config.secret, "abc");
        assert_eq!(config.ttl_seconds, 86400);

        unsafe {
            std::env::remove_var("SESSION_SECRET");
        }
    }

    #[test]
    #[serial]
    fn test_session_config_rejects_bad_ttl() {
        unsafe {
            std::env::set_var("SESSION_SECRET", "abc");
        }

        for bad in ["one day", "-5", "0", ""] {
            unsafe {
                std::env::set_var("SESSION_TTL_SECONDS", bad);
            }
            assert!(SessionConfig::from_env().is_err(), "accepted {bad:?}");
        }

        unsafe {
            std::env::set_var("SESSION_TTL_SECONDS", "3600");
        }
        assert_eq!(SessionConfig::from_env().unwrap().ttl_seconds, 3600);

        unsafe {
            std::env::remove_var("SESSION_TTL_SECONDS");
            std::env::remove_var("SESSION_SECRET");
        }
    }
}
