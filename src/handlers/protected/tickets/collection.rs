use axum::{
    extract::{Query, State},
    Extension, Json,
};

use crate::database::models::{Ticket, TicketFilter};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::CreateTicket;
use crate::state::AppState;

/// GET /api/tickets - list tickets visible to the actor, optionally
/// filtered by status/category/priority
pub async fn get(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Query(filter): Query<TicketFilter>,
) -> ApiResult<Vec<Ticket>> {
    let tickets = state.tickets().list(&actor, filter).await?;
    Ok(ApiResponse::success(tickets))
}

/// POST /api/tickets - create a ticket. Location names/ids are resolved to
/// the normalized five-level chain; the creator is the authenticated actor.
pub async fn post(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Json(req): Json<CreateTicket>,
) -> ApiResult<Ticket> {
    let ticket = state.tickets().create(&actor, req).await?;
    Ok(ApiResponse::created(ticket))
}
