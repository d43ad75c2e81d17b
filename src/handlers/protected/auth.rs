use axum::{extract::State, Extension, Json};
use serde_json::{json, Value};

use crate::database::models::User;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::user_service::ChangePasswordRequest;
use crate::state::AppState;

/// GET /api/auth/whoami - current actor's account record
pub async fn whoami_get(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
) -> ApiResult<User> {
    let user = state.users().whoami(&actor).await?;
    Ok(ApiResponse::success(user))
}

/// PUT /api/auth/password - change own password, current one required
pub async fn password_put(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<Value> {
    state.users().change_password(&actor, req).await?;
    Ok(ApiResponse::success(json!({ "changed": true })))
}
