use axum::{Json, extract::State, response::IntoResponse};
use serde_json::json;

use crate::{AppState, error::ApiResult};

/// Store-wide totals for the admin dashboard
pub async fn stats(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let stats = state.stats_repository.admin_stats().await?;

    Ok(Json(json!({ "success": true, "stats": stats })))
}
