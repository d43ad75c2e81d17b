use axum::{extract::State, Json};

use crate::database::models::User;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::user_service::RegisterRequest;
use crate::state::AppState;

/// POST /auth/register - self-service account creation. New accounts always
/// get the `user` role; staff roles are granted through user administration.
pub async fn register_post(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<User> {
    let user = state.users().register(req).await?;
    Ok(ApiResponse::created(user))
}
