use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;

use crate::database::models::TicketComment;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct NewCommentBody {
    pub body: String,
}

/// GET /api/tickets/:id/comments
pub async fn get(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Vec<TicketComment>> {
    let comments = state.tickets().comments(&actor, id).await?;
    Ok(ApiResponse::success(comments))
}

/// POST /api/tickets/:id/comments
pub async fn post(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(req): Json<NewCommentBody>,
) -> ApiResult<TicketComment> {
    let comment = state.tickets().add_comment(&actor, id, &req.body).await?;
    Ok(ApiResponse::created(comment))
}
