//! Error type for the authentication service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::error::is_unique_violation;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("{0}")]
    Forbidden(String),

    #[error("Too many sign-in attempts, please try again later")]
    TooManyAttempts,

    #[error("Internal server error")]
    InternalServerError,

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl AuthError {
    pub fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            AuthError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AuthError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, self.to_string()),
            AuthError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            AuthError::TooManyAttempts => (StatusCode::TOO_MANY_REQUESTS, self.to_string()),
            AuthError::InternalServerError => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            AuthError::Database(err) if is_unique_violation(err) => (
                StatusCode::CONFLICT,
                "Email is already registered".to_string(),
            ),
            AuthError::Database(err) => {
                error!(error = %err, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_message) = self.status_and_message();

        let body = Json(json!({
            "success": false,
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AuthError::InvalidCredentials.status_and_message().0,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::TooManyAttempts.status_and_message().0,
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AuthError::Validation("bad".into()).status_and_message(),
            (StatusCode::BAD_REQUEST, "bad".to_string())
        );
    }

    #[test]
    fn test_database_details_are_not_leaked() {
        let (status, message) =
            AuthError::Database(sqlx::Error::PoolTimedOut).status_and_message();

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(message, "Internal server error");
    }
}
