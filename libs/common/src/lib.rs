//! Shared library for the storefront services
//!
//! Both the auth service and the API service start the same way:
//!
//! ```rust,no_run
//! use common::database::{DatabaseConfig, init_pool, run_migrations};
//! use common::session::{SessionConfig, SessionTokens};
//!
//! # async fn start() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = init_pool(&DatabaseConfig::from_env()?).await?;
//! run_migrations(&pool).await?;
//! let sessions = SessionTokens::new(&SessionConfig::from_env()?);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod database;
pub mod error;
pub mod password;
pub mod role;
pub mod session;
