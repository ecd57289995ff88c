//! Service configuration, read from `STOREFRONT_AUTH_*` environment variables
//! layered over built-in defaults.

use common::role::RolePolicy;
use config::{Config, ConfigError, Environment};
use serde::Deserialize;

use crate::rate_limiter::RateLimiterConfig;

/// Authentication service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
    /// Mark the session cookie `Secure` (enable behind TLS)
    pub secure_cookie: bool,
    /// Failed-or-not sign-in attempts allowed per email within the window
    pub login_max_attempts: u32,
    pub login_window_seconds: u64,
    pub login_ban_seconds: u64,
    pub legacy_user_role_as_customer: bool,
}

impl AuthConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(Environment::with_prefix("STOREFRONT_AUTH"))
    }

    fn load(environment: Environment) -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("host", "0.0.0.0")?
            .set_default("port", 3002)?
            .set_default("cors_origin", "http://localhost:3000")?
            .set_default("secure_cookie", false)?
            .set_default("login_max_attempts", 5)?
            .set_default("login_window_seconds", 300)?
            .set_default("login_ban_seconds", 3600)?
            .set_default("legacy_user_role_as_customer", true)?
            .add_source(environment.try_parsing(true))
            .build()?
            .try_deserialize()
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn rate_limiter(&self) -> RateLimiterConfig {
        RateLimiterConfig {
            max_attempts: self.login_max_attempts,
            window_seconds: self.login_window_seconds,
            ban_duration_seconds: self.login_ban_seconds,
        }
    }

    pub fn role_policy(&self) -> RolePolicy {
        RolePolicy {
            legacy_user_as_customer: self.legacy_user_role_as_customer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn environment(vars: &[(&str, &str)]) -> Environment {
        let source = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<config::Map<String, String>>();
        Environment::with_prefix("STOREFRONT_AUTH").source(Some(source))
    }

    #[test]
    fn test_defaults() {
        let config = AuthConfig::load(environment(&[])).unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:3002");
        assert!(!config.secure_cookie);

        let limiter = config.rate_limiter();
        assert_eq!(limiter.max_attempts, 5);
        assert_eq!(limiter.window_seconds, 300);
        assert_eq!(limiter.ban_duration_seconds, 3600);
    }

    #[test]
    fn test_overrides() {
        let config = AuthConfig::load(environment(&[
            ("STOREFRONT_AUTH_SECURE_COOKIE", "true"),
            ("STOREFRONT_AUTH_LOGIN_MAX_ATTEMPTS", "3"),
            ("STOREFRONT_AUTH_LEGACY_USER_ROLE_AS_CUSTOMER", "false"),
        ]))
        .unwrap();

        assert!(config.secure_cookie);
        assert_eq!(config.rate_limiter().max_attempts, 3);
        assert!(!config.role_policy().legacy_user_as_customer);
    }
}
