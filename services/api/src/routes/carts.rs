//! Shopping cart handlers. Customer-only; every call acts on the caller's cart.

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    AppState,
    error::{ApiResult, StoreError},
    middleware::AuthUser,
    models::cart::AddCartItemRequest,
};

/// Add one product variant to the cart, merging with an existing line
pub async fn add_item(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<AddCartItemRequest>,
) -> ApiResult<impl IntoResponse> {
    let command = payload.into_command()?;
    let cart = state
        .cart_repository
        .add_or_update_item(user.id, &command)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Item added to cart",
        "cart": cart,
    })))
}

/// The caller's cart; `id` is the caller's user id
pub async fn get_cart(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    user.ensure_self(id)?;

    let cart = state
        .cart_repository
        .find_by_user(user.id)
        .await?
        .ok_or(StoreError::CartNotFound)?;

    Ok(Json(json!({ "success": true, "cart": cart })))
}

pub async fn cart_stats(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    user.ensure_self(id)?;
    let stats = state.cart_repository.stats(user.id).await?;

    Ok(Json(json!({ "success": true, "stats": stats })))
}

/// Delete the caller's cart; `id` is the cart id
pub async fn delete_cart(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    if !state.cart_repository.delete_cart(user.id, id).await? {
        return Err(StoreError::CartNotFound.into());
    }

    Ok(Json(json!({ "success": true, "message": "Shopping cart deleted" })))
}

pub async fn remove_item(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(item_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let cart = state.cart_repository.remove_item(user.id, item_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Item removed from cart",
        "cart": cart,
    })))
}
