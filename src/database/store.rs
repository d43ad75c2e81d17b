use async_trait::async_trait;
use thiserror::Error;

use crate::database::models::{
    Attachment, AttachmentMeta, LocationLevel, LocationNode, NewAttachment, NewHistoryEntry,
    NewTicket, NewUser, Ticket, TicketComment, TicketFilter, TicketHistoryEntry, TicketPatch,
    User, UserPatch,
};
use crate::policy::VisibilityScope;

/// Errors from the storage layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// The single durable-store interface. One implementation is chosen at
/// process start ([`PgStore`](super::pg::PgStore) or
/// [`MemStore`](super::memory::MemStore)); connectivity problems surface at
/// startup, never as a per-request fallback.
///
/// The contract mirrors what the core needs and nothing more: point lookups
/// by id, scoped child lookups by parent id and name, insert-returning and
/// partial-update-returning operations.
#[async_trait]
pub trait Store: Send + Sync {
    // -- users --
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError>;
    async fn user_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;
    async fn user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;
    async fn update_user(&self, id: i64, patch: UserPatch) -> Result<User, StoreError>;

    // -- locations --
    async fn insert_location(
        &self,
        level: LocationLevel,
        name: &str,
        parent_id: Option<i64>,
    ) -> Result<LocationNode, StoreError>;
    async fn location_by_id(
        &self,
        level: LocationLevel,
        id: i64,
    ) -> Result<Option<LocationNode>, StoreError>;
    /// Scoped name lookup: the same name under a different parent is a
    /// different node.
    async fn location_by_name(
        &self,
        level: LocationLevel,
        parent_id: Option<i64>,
        name: &str,
    ) -> Result<Option<LocationNode>, StoreError>;
    async fn locations_by_parent(
        &self,
        level: LocationLevel,
        parent_id: Option<i64>,
    ) -> Result<Vec<LocationNode>, StoreError>;

    // -- tickets --
    async fn insert_ticket(&self, ticket: NewTicket) -> Result<Ticket, StoreError>;
    async fn ticket_by_id(&self, id: i64) -> Result<Option<Ticket>, StoreError>;
    async fn list_tickets(
        &self,
        scope: &VisibilityScope,
        filter: &TicketFilter,
    ) -> Result<Vec<Ticket>, StoreError>;
    async fn update_ticket(&self, id: i64, patch: TicketPatch) -> Result<Ticket, StoreError>;
    async fn delete_ticket(&self, id: i64) -> Result<(), StoreError>;

    // -- comments --
    async fn insert_comment(
        &self,
        ticket_id: i64,
        author_id: i64,
        body: &str,
    ) -> Result<TicketComment, StoreError>;
    async fn comments_for_ticket(&self, ticket_id: i64) -> Result<Vec<TicketComment>, StoreError>;
    async fn delete_comments_for_ticket(&self, ticket_id: i64) -> Result<u64, StoreError>;

    // -- attachments --
    async fn insert_attachment(&self, att: NewAttachment) -> Result<AttachmentMeta, StoreError>;
    async fn attachment_by_id(
        &self,
        ticket_id: i64,
        id: i64,
    ) -> Result<Option<Attachment>, StoreError>;
    async fn attachments_for_ticket(
        &self,
        ticket_id: i64,
    ) -> Result<Vec<AttachmentMeta>, StoreError>;
    async fn delete_attachments_for_ticket(&self, ticket_id: i64) -> Result<u64, StoreError>;

    // -- history --
    async fn insert_history(&self, entries: Vec<NewHistoryEntry>) -> Result<(), StoreError>;
    async fn history_for_ticket(
        &self,
        ticket_id: i64,
    ) -> Result<Vec<TicketHistoryEntry>, StoreError>;
    async fn delete_history_for_ticket(&self, ticket_id: i64) -> Result<u64, StoreError>;

    /// Liveness probe used by `/health` and by startup verification.
    async fn ping(&self) -> Result<(), StoreError>;
}
