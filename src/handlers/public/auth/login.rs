use axum::{extract::State, Json};

use crate::middleware::{ApiResponse, ApiResult};
use crate::services::user_service::{LoginRequest, LoginResponse};
use crate::state::AppState;

/// POST /auth/login - authenticate and receive a bearer token
pub async fn login_post(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<LoginResponse> {
    let response = state.users().login(req).await?;
    Ok(ApiResponse::success(response))
}
