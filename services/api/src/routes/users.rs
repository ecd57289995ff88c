//! User handlers

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::{
    AppState,
    error::{ApiResult, StoreError},
    middleware::AuthUser,
    models::user::{
        CreateUserRequest, UpdateUserRequest, UserChanges, validate_email, validate_name,
    },
};

fn user_not_found() -> StoreError {
    StoreError::NotFound("User not found".to_string())
}

pub async fn me(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<impl IntoResponse> {
    let user = state
        .user_repository
        .find_by_id(user.id)
        .await?
        .ok_or_else(user_not_found)?;

    Ok(Json(json!({ "success": true, "user": user })))
}

pub async fn list_users(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let users = state.user_repository.list().await?;

    Ok(Json(json!({
        "success": true,
        "count": users.len(),
        "users": users,
    })))
}

pub async fn get_user(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    caller.ensure_self_or_admin(id)?;

    let user = state
        .user_repository
        .find_by_id(id)
        .await?
        .ok_or_else(user_not_found)?;

    Ok(Json(json!({ "success": true, "user": user })))
}

/// Admin-issued account. The generated password is only ever returned here.
pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> ApiResult<impl IntoResponse> {
    validate_name(&payload.name)?;
    let role = state
        .role_policy
        .parse(&payload.role)
        .map_err(|e| StoreError::Validation(e.to_string()))?;

    let created = state
        .user_repository
        .create_issued(payload.name.trim(), role)
        .await?;
    info!(user_id = %created.user.id, role = %role, "Admin created user");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "User created",
            "user": created.user,
            "password": created.password,
        })),
    ))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> ApiResult<impl IntoResponse> {
    let mut changes = UserChanges::default();

    if let Some(name) = payload.name {
        validate_name(&name)?;
        changes.name = Some(name.trim().to_string());
    }
    if let Some(email) = payload.email {
        validate_email(&email)?;
        changes.email = Some(email.trim().to_lowercase());
    }
    if let Some(role) = payload.role {
        let role = state
            .role_policy
            .parse(&role)
            .map_err(|e| StoreError::Validation(e.to_string()))?;
        changes.role = Some(role);
    }

    let user = state
        .user_repository
        .update(id, &changes)
        .await?
        .ok_or_else(user_not_found)?;

    Ok(Json(json!({
        "success": true,
        "message": "User updated",
        "user": user,
    })))
}

/// Delete the caller's own account
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    caller.ensure_self(id)?;

    if !state.user_repository.delete(id).await? {
        return Err(user_not_found().into());
    }
    info!(user_id = %id, "User deleted own account");

    Ok(Json(json!({ "success": true, "message": "User deleted" })))
}
