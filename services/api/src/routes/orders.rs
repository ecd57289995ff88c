//! Order handlers

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    AppState,
    error::ApiResult,
    middleware::AuthUser,
    models::order::{CreateOrderRequest, OrderStatus, UpdateOrderStatusRequest},
};

/// Check out the caller's cart
pub async fn create_order(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateOrderRequest>,
) -> ApiResult<impl IntoResponse> {
    let cart_id = payload.cart_id()?;
    let order = state
        .order_repository
        .create_from_cart(user.id, cart_id)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Order created",
            "order": order,
        })),
    ))
}

/// Orders of one user; customers may only list their own
pub async fn list_user_orders(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    user.ensure_self_or_admin(user_id)?;
    let orders = state.order_repository.list_for_user(user_id).await?;

    Ok(Json(json!({
        "success": true,
        "count": orders.len(),
        "orders": orders,
    })))
}

pub async fn list_orders(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let orders = state.order_repository.list_all().await?;

    Ok(Json(json!({
        "success": true,
        "count": orders.len(),
        "orders": orders,
    })))
}

pub async fn update_order_status(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> ApiResult<impl IntoResponse> {
    let status: OrderStatus = payload.status.parse()?;
    let order = state
        .order_repository
        .update_status(order_id, status)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Order status updated",
        "order": order,
    })))
}
