use axum::{
    extract::{Path, State},
    Extension,
};

use crate::database::models::TicketHistoryEntry;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::state::AppState;

/// GET /api/tickets/:id/history - field-change audit trail
pub async fn get(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Vec<TicketHistoryEntry>> {
    let entries = state.tickets().history(&actor, id).await?;
    Ok(ApiResponse::success(entries))
}
