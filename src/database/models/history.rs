use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// One field change on a ticket, recorded by the update path. A single
/// update producing several changed fields yields several rows.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TicketHistoryEntry {
    pub id: i64,
    pub ticket_id: i64,
    pub actor_id: i64,
    pub field: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewHistoryEntry {
    pub ticket_id: i64,
    pub actor_id: i64,
    pub field: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}
