//! Custom error types for the common library
//!
//! This module defines application-specific error types that can be used
//! throughout the application.

use sqlx::Error as SqlxError;
use thiserror::Error;

/// Custom error type for database operations
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error occurred during database connection
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// Error occurred during database query execution
    #[error("Database query error: {0}")]
    Query(#[source] SqlxError),

    /// Error occurred during database migration
    #[error("Database migration error: {0}")]
    Migration(String),

    /// Configuration error
    #[error("Database configuration error: {0}")]
    Configuration(String),
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// SQLSTATE codes the services branch on
pub mod sqlstate {
    pub const UNIQUE_VIOLATION: &str = "23505";
    pub const FOREIGN_KEY_VIOLATION: &str = "23503";
    pub const CHECK_VIOLATION: &str = "23514";
    pub const NUMERIC_VALUE_OUT_OF_RANGE: &str = "22003";
    pub const SERIALIZATION_FAILURE: &str = "40001";
    pub const DEADLOCK_DETECTED: &str = "40P01";
}

/// Return the SQLSTATE code carried by a driver error, if any
pub fn sqlstate_of(err: &SqlxError) -> Option<String> {
    match err {
        SqlxError::Database(db_err) => db_err.code().map(|code| code.into_owned()),
        _ => None,
    }
}

/// Whether the error is a unique constraint violation
pub fn is_unique_violation(err: &SqlxError) -> bool {
    sqlstate_of(err).as_deref() == Some(sqlstate::UNIQUE_VIOLATION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_database_errors_have_no_sqlstate() {
        assert_eq!(sqlstate_of(&SqlxError::RowNotFound), None);
        assert!(!is_unique_violation(&SqlxError::PoolTimedOut));
    }
}
