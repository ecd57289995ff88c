//! Catalog handlers: products, variants and categories

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    AppState,
    error::{ApiResult, StoreError},
    models::catalog::{NewCategory, NewProduct, ProductQuery, StockAdjustment, UpdateProduct},
    repositories::catalog::ProductCreation,
};

fn product_not_found() -> StoreError {
    StoreError::NotFound("Product not found".to_string())
}

pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> ApiResult<impl IntoResponse> {
    let products = state.product_repository.list(&query).await?;

    Ok(Json(json!({
        "success": true,
        "count": products.len(),
        "products": products,
    })))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let product = state
        .product_repository
        .find_by_id(id)
        .await?
        .ok_or_else(product_not_found)?;

    Ok(Json(json!({ "success": true, "product": product })))
}

pub async fn get_product_by_sku(
    State(state): State<AppState>,
    Path(sku): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let product = state
        .product_repository
        .find_by_sku(&sku)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("No product with SKU {sku}")))?;

    Ok(Json(json!({ "success": true, "product": product })))
}

/// Latest products of a category
pub async fn products_in_category(
    State(state): State<AppState>,
    Path(category_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let products = state
        .product_repository
        .latest_in_category(category_id)
        .await?;

    Ok(Json(json!({ "success": true, "products": products })))
}

pub async fn create_product(
    State(state): State<AppState>,
    Json(payload): Json<NewProduct>,
) -> ApiResult<impl IntoResponse> {
    payload.validate()?;

    let response = match state.product_repository.create(&payload).await? {
        ProductCreation::Created(product) => (
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "message": "Product created",
                "product": product,
            })),
        ),
        ProductCreation::VariantsAdded(product) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Variants added to existing product",
                "product": product,
            })),
        ),
    };

    Ok(response)
}

pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProduct>,
) -> ApiResult<impl IntoResponse> {
    payload.validate()?;

    let product = state
        .product_repository
        .update(id, &payload)
        .await?
        .ok_or_else(product_not_found)?;

    Ok(Json(json!({
        "success": true,
        "message": "Product updated",
        "product": product,
    })))
}

pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    if !state.product_repository.delete(id).await? {
        return Err(product_not_found().into());
    }

    Ok(Json(json!({ "success": true, "message": "Product deleted" })))
}

pub async fn delete_variant(
    State(state): State<AppState>,
    Path((id, sku)): Path<(Uuid, String)>,
) -> ApiResult<impl IntoResponse> {
    if !state.product_repository.delete_variant(id, &sku).await? {
        return Err(StoreError::ProductNotFound { product_id: id, sku }.into());
    }

    Ok(Json(json!({ "success": true, "message": "Variant deleted" })))
}

/// Record a sale: stock goes down, never below zero
pub async fn sell_stock(
    State(state): State<AppState>,
    Path((id, sku)): Path<(Uuid, String)>,
    Json(payload): Json<StockAdjustment>,
) -> ApiResult<impl IntoResponse> {
    payload.validate()?;
    let variant = state
        .product_repository
        .sell(id, &sku, payload.quantity)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Stock updated",
        "variant": variant,
    })))
}

pub async fn receive_stock(
    State(state): State<AppState>,
    Path((id, sku)): Path<(Uuid, String)>,
    Json(payload): Json<StockAdjustment>,
) -> ApiResult<impl IntoResponse> {
    payload.validate()?;
    let variant = state
        .product_repository
        .receive(id, &sku, payload.quantity)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Stock updated",
        "variant": variant,
    })))
}

pub async fn list_categories(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let categories = state.category_repository.list().await?;

    Ok(Json(json!({ "success": true, "categories": categories })))
}

pub async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let category = state
        .category_repository
        .find_by_id(id)
        .await?
        .ok_or_else(|| StoreError::NotFound("Category not found".to_string()))?;

    Ok(Json(json!({ "success": true, "category": category })))
}

pub async fn create_category(
    State(state): State<AppState>,
    Json(payload): Json<NewCategory>,
) -> ApiResult<impl IntoResponse> {
    payload.validate()?;
    let category = state.category_repository.create(&payload).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Category created",
            "category": category,
        })),
    ))
}

pub async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    if !state.category_repository.delete(id).await? {
        return Err(StoreError::NotFound("Category not found".to_string()).into());
    }

    Ok(Json(json!({ "success": true, "message": "Category deleted" })))
}
