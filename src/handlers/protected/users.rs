use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde_json::{json, Value};

use crate::database::models::User;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::user_service::{AdminCreateUser, AdminUpdateUser};
use crate::state::AppState;

/// GET /api/users - admin only
pub async fn list_get(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
) -> ApiResult<Vec<User>> {
    let users = state.users().admin_list(&actor).await?;
    Ok(ApiResponse::success(users))
}

/// POST /api/users - admin creates staff and submitter accounts
pub async fn list_post(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Json(req): Json<AdminCreateUser>,
) -> ApiResult<User> {
    let user = state.users().admin_create(&actor, req).await?;
    Ok(ApiResponse::created(user))
}

/// PATCH /api/users/:id - role, department, active flag, contact details
pub async fn record_patch(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(req): Json<AdminUpdateUser>,
) -> ApiResult<User> {
    let user = state.users().admin_update(&actor, id, req).await?;
    Ok(ApiResponse::success(user))
}

/// POST /api/users/:id/password/reset - returns the fresh temporary secret
/// exactly once
pub async fn password_reset_post(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Value> {
    let secret = state.users().admin_reset_password(&actor, id).await?;
    Ok(ApiResponse::success(json!({ "temporary_password": secret })))
}
