use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde_json::{json, Value};

use crate::database::models::Ticket;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::policy::TicketUpdate;
use crate::state::AppState;

/// GET /api/tickets/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Ticket> {
    let ticket = state.tickets().get(&actor, id).await?;
    Ok(ApiResponse::success(ticket))
}

/// PATCH /api/tickets/:id - role-gated partial update
pub async fn patch(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(update): Json<TicketUpdate>,
) -> ApiResult<Ticket> {
    let ticket = state.tickets().update(&actor, id, update).await?;
    Ok(ApiResponse::success(ticket))
}

/// DELETE /api/tickets/:id - admin only, cascades to comments,
/// attachments and history
pub async fn delete(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Value> {
    state.tickets().delete(&actor, id).await?;
    Ok(ApiResponse::success(json!({ "deleted": id })))
}
