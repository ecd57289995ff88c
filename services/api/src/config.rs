//! Service configuration
//!
//! Values come from `STOREFRONT_*` environment variables layered over the
//! defaults below, e.g. `STOREFRONT_PORT=8080`.

use common::role::RolePolicy;
use config::{Config, ConfigError, Environment};
use serde::Deserialize;

/// API service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Interface to bind (default: "0.0.0.0")
    pub host: String,
    /// Port to listen on (default: 3001)
    pub port: u16,
    /// Origin allowed to call the API with credentials
    pub cors_origin: String,
    /// Attempts for a cart transaction that hit a serialization failure,
    /// deadlock or the first-cart race (default: 3)
    pub cart_max_attempts: u32,
    /// Accept the legacy `user` role name as `customer` (default: true)
    pub legacy_user_role_as_customer: bool,
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(Environment::with_prefix("STOREFRONT"))
    }

    fn load(environment: Environment) -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("host", "0.0.0.0")?
            .set_default("port", 3001)?
            .set_default("cors_origin", "http://localhost:3000")?
            .set_default("cart_max_attempts", 3)?
            .set_default("legacy_user_role_as_customer", true)?
            .add_source(environment.try_parsing(true))
            .build()?
            .try_deserialize()
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
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
        Environment::with_prefix("STOREFRONT").source(Some(source))
    }

    #[test]
    fn test_defaults() {
        let config = ApiConfig::load(environment(&[])).unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:3001");
        assert_eq!(config.cors_origin, "http://localhost:3000");
        assert_eq!(config.cart_max_attempts, 3);
        assert!(config.role_policy().legacy_user_as_customer);
    }

    #[test]
    fn test_environment_overrides_defaults() {
        let config = ApiConfig::load(environment(&[
            ("STOREFRONT_PORT", "8080"),
            ("STOREFRONT_CART_MAX_ATTEMPTS", "5"),
            ("STOREFRONT_LEGACY_USER_ROLE_AS_CUSTOMER", "false"),
        ]))
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.cart_max_attempts, 5);
        assert!(!config.role_policy().legacy_user_as_customer);
    }
}
