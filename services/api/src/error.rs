//! Error types for the API service
//!
//! [`StoreError`] is what repositories and the cart/order logic return.
//! [`ApiError`] is the HTTP edge: every handler returns it and it renders as
//! `{"success": false, "error": "..."}` with the matching status code.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::error::{DatabaseError, sqlstate};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::models::order::OrderStatus;

/// Constraint hit when two first-adds for the same user race each other
const CART_OWNER_CONSTRAINT: &str = "shopping_carts_user_id_key";

/// Errors raised by the catalog, cart and order stores
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Product with ID {product_id} and SKU {sku} does not exist")]
    ProductNotFound { product_id: Uuid, sku: String },

    #[error("Insufficient stock for product with SKU {sku}. Available stock: {available}")]
    InsufficientStock { sku: String, available: i32 },

    #[error("Shopping cart not found")]
    CartNotFound,

    #[error("Shopping cart is empty")]
    EmptyCart,

    #[error("A valid shoppingCartId is required")]
    InvalidCartReference,

    #[error("Cannot change order status from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Failed to create shopping cart")]
    CartPersistenceFailure,

    #[error("Failed to create order")]
    OrderPersistenceFailure,

    #[error("Failed to remove shopping cart after creating order")]
    CartTeardownFailure,

    #[error("{0}")]
    Internal(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Whether the whole transaction can be replayed
    pub fn is_retryable(&self) -> bool {
        let StoreError::Database(sqlx::Error::Database(db_err)) = self else {
            return false;
        };

        match db_err.code().as_deref() {
            Some(sqlstate::SERIALIZATION_FAILURE) | Some(sqlstate::DEADLOCK_DETECTED) => true,
            Some(sqlstate::UNIQUE_VIOLATION) => db_err.constraint() == Some(CART_OWNER_CONSTRAINT),
            _ => false,
        }
    }
}

/// Custom error type for the API service
#[derive(Error, Debug)]
pub enum ApiError {
    /// Missing, invalid, expired or revoked session
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated but not allowed
    #[error("{0}")]
    Forbidden(String),

    /// Internal server error
    #[error("Internal server error")]
    InternalServerError,

    /// Database infrastructure error
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Domain error from a store
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Store(StoreError::Database(err))
    }
}

impl ApiError {
    /// Status code and client-facing message
    pub fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            ApiError::InternalServerError => internal(),
            ApiError::Database(err) => {
                tracing::error!(error = %err, "Database infrastructure error");
                internal()
            }
            ApiError::Store(err) => store_status(err),
        }
    }
}

fn internal() -> (StatusCode, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

fn store_status(err: &StoreError) -> (StatusCode, String) {
    match err {
        StoreError::ProductNotFound { .. } | StoreError::CartNotFound | StoreError::NotFound(_) => {
            (StatusCode::NOT_FOUND, err.to_string())
        }
        StoreError::InsufficientStock { .. }
        | StoreError::EmptyCart
        | StoreError::InvalidCartReference
        | StoreError::Validation(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        StoreError::InvalidStatusTransition { .. } | StoreError::Conflict(_) => {
            (StatusCode::CONFLICT, err.to_string())
        }
        StoreError::CartPersistenceFailure
        | StoreError::OrderPersistenceFailure
        | StoreError::CartTeardownFailure => {
            tracing::error!(error = %err, "Persistence failure");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
        StoreError::Internal(msg) => {
            tracing::error!(error = %msg, "Internal failure");
            internal()
        }
        StoreError::Database(db_err) => classify_sqlx_error(db_err),
    }
}

/// Map driver errors that escaped the stores onto HTTP statuses
fn classify_sqlx_error(err: &sqlx::Error) -> (StatusCode, String) {
    match err {
        sqlx::Error::RowNotFound => (StatusCode::NOT_FOUND, "Resource not found".to_string()),
        sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
            Some(sqlstate::UNIQUE_VIOLATION) => (
                StatusCode::CONFLICT,
                "Duplicate field value entered".to_string(),
            ),
            Some(sqlstate::FOREIGN_KEY_VIOLATION) => (
                StatusCode::CONFLICT,
                "Resource is still referenced by other records".to_string(),
            ),
            Some(sqlstate::CHECK_VIOLATION) | Some(sqlstate::NUMERIC_VALUE_OUT_OF_RANGE) => (
                StatusCode::BAD_REQUEST,
                format!("Validation failed: {}", db_err.message()),
            ),
            _ => {
                tracing::error!(error = %db_err, "Database error");
                internal()
            }
        },
        other => {
            tracing::error!(error = %other, "Database error");
            internal()
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = self.status_and_message();

        let body = Json(json!({
            "success": false,
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;
