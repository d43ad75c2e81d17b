use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};
use std::time::Duration;
use tracing::info;

use crate::config;
use crate::database::models::{
    Attachment, AttachmentMeta, LocationLevel, LocationNode, NewAttachment, NewHistoryEntry,
    NewTicket, NewUser, Ticket, TicketComment, TicketFilter, TicketHistoryEntry, TicketPatch,
    User, UserPatch,
};
use crate::database::store::{Store, StoreError};
use crate::policy::VisibilityScope;

/// Postgres-backed store. The pool is built once at startup and the
/// connection is verified before the server starts accepting requests, so a
/// misconfigured or unreachable database is a startup error rather than a
/// per-request surprise.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect() -> Result<Self, StoreError> {
        let url = std::env::var("DATABASE_URL")
            .map_err(|_| StoreError::ConfigMissing("DATABASE_URL"))?;
        let db = &config::config().database;

        let pool = PgPoolOptions::new()
            .max_connections(db.max_connections)
            .acquire_timeout(Duration::from_secs(db.connection_timeout_secs))
            .connect(&url)
            .await?;

        sqlx::query("SELECT 1").execute(&pool).await?;
        info!("Connected to Postgres store");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// True when the driver reports a unique-constraint violation.
    fn is_unique_violation(err: &sqlx::Error) -> bool {
        matches!(
            err,
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505")
        )
    }
}

#[async_trait]
impl Store for PgStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(
            "INSERT INTO users \
             (username, password_hash, full_name, email, role, department_id) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
        )
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .bind(&user.email)
        .bind(user.role)
        .bind(user.department_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if Self::is_unique_violation(&e) {
                StoreError::Conflict(format!("username '{}' already exists", user.username))
            } else {
                StoreError::Sqlx(e)
            }
        })
    }

    async fn user_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
                .bind(username)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY id")
            .fetch_all(&self.pool)
            .await?)
    }

    async fn update_user(&self, id: i64, patch: UserPatch) -> Result<User, StoreError> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE users SET updated_at = ");
        qb.push_bind(Utc::now());
        if let Some(full_name) = patch.full_name {
            qb.push(", full_name = ").push_bind(full_name);
        }
        if let Some(email) = patch.email {
            qb.push(", email = ").push_bind(email);
        }
        if let Some(role) = patch.role {
            qb.push(", role = ").push_bind(role);
        }
        if let Some(department_id) = patch.department_id {
            qb.push(", department_id = ").push_bind(department_id);
        }
        if let Some(active) = patch.active {
            qb.push(", active = ").push_bind(active);
        }
        if let Some(password_hash) = patch.password_hash {
            qb.push(", password_hash = ").push_bind(password_hash);
        }
        qb.push(" WHERE id = ").push_bind(id);
        qb.push(" RETURNING *");
        qb.build_query_as::<User>()
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("user {}", id)))
    }

    async fn insert_location(
        &self,
        level: LocationLevel,
        name: &str,
        parent_id: Option<i64>,
    ) -> Result<LocationNode, StoreError> {
        sqlx::query_as::<_, LocationNode>(
            "INSERT INTO locations (level, name, parent_id) \
             VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(level)
        .bind(name)
        .bind(parent_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if Self::is_unique_violation(&e) {
                StoreError::Conflict(format!(
                    "{} '{}' already exists under this parent",
                    level.as_str(),
                    name
                ))
            } else {
                StoreError::Sqlx(e)
            }
        })
    }

    async fn location_by_id(
        &self,
        level: LocationLevel,
        id: i64,
    ) -> Result<Option<LocationNode>, StoreError> {
        Ok(sqlx::query_as::<_, LocationNode>(
            "SELECT * FROM locations WHERE id = $1 AND level = $2",
        )
        .bind(id)
        .bind(level)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn location_by_name(
        &self,
        level: LocationLevel,
        parent_id: Option<i64>,
        name: &str,
    ) -> Result<Option<LocationNode>, StoreError> {
        // IS NOT DISTINCT FROM makes the NULL parent (buildings) compare equal
        Ok(sqlx::query_as::<_, LocationNode>(
            "SELECT * FROM locations \
             WHERE level = $1 AND name = $2 AND parent_id IS NOT DISTINCT FROM $3",
        )
        .bind(level)
        .bind(name)
        .bind(parent_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn locations_by_parent(
        &self,
        level: LocationLevel,
        parent_id: Option<i64>,
    ) -> Result<Vec<LocationNode>, StoreError> {
        match parent_id {
            Some(parent) => Ok(sqlx::query_as::<_, LocationNode>(
                "SELECT * FROM locations WHERE level = $1 AND parent_id = $2 ORDER BY name",
            )
            .bind(level)
            .bind(parent)
            .fetch_all(&self.pool)
            .await?),
            None => Ok(sqlx::query_as::<_, LocationNode>(
                "SELECT * FROM locations WHERE level = $1 ORDER BY name",
            )
            .bind(level)
            .fetch_all(&self.pool)
            .await?),
        }
    }

    async fn insert_ticket(&self, ticket: NewTicket) -> Result<Ticket, StoreError> {
        let loc = &ticket.location;
        Ok(sqlx::query_as::<_, Ticket>(
            "INSERT INTO tickets \
             (title, description, category, priority, status, \
              building_id, floor_id, room_id, area_id, element_id, \
              building_name, floor_name, room_name, area_name, element_name, \
              created_by, assignee_id, department_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, \
                     $11, $12, $13, $14, $15, $16, $17, $18) \
             RETURNING *",
        )
        .bind(&ticket.title)
        .bind(&ticket.description)
        .bind(ticket.category)
        .bind(ticket.priority)
        .bind(ticket.status)
        .bind(loc.building_id)
        .bind(loc.floor_id)
        .bind(loc.room_id)
        .bind(loc.area_id)
        .bind(loc.element_id)
        .bind(&loc.building_name)
        .bind(&loc.floor_name)
        .bind(&loc.room_name)
        .bind(&loc.area_name)
        .bind(&loc.element_name)
        .bind(ticket.created_by)
        .bind(ticket.assignee_id)
        .bind(ticket.department_id)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn ticket_by_id(&self, id: i64) -> Result<Option<Ticket>, StoreError> {
        Ok(
            sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn list_tickets(
        &self,
        scope: &VisibilityScope,
        filter: &TicketFilter,
    ) -> Result<Vec<Ticket>, StoreError> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT * FROM tickets WHERE 1=1");
        match scope {
            VisibilityScope::All => {}
            VisibilityScope::CreatedBy(user_id) => {
                qb.push(" AND created_by = ").push_bind(*user_id);
            }
            VisibilityScope::AssignedToOrUnassigned(user_id) => {
                qb.push(" AND (assignee_id IS NULL OR assignee_id = ");
                qb.push_bind(*user_id);
                qb.push(")");
            }
            VisibilityScope::Department(Some(department_id)) => {
                qb.push(" AND department_id = ").push_bind(*department_id);
            }
            VisibilityScope::Department(None) => {
                qb.push(" AND department_id IS NULL");
            }
        }
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status);
        }
        if let Some(category) = filter.category {
            qb.push(" AND category = ").push_bind(category);
        }
        if let Some(priority) = filter.priority {
            qb.push(" AND priority = ").push_bind(priority);
        }
        qb.push(" ORDER BY created_at DESC, id DESC");
        Ok(qb.build_query_as::<Ticket>().fetch_all(&self.pool).await?)
    }

    async fn update_ticket(&self, id: i64, patch: TicketPatch) -> Result<Ticket, StoreError> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE tickets SET updated_at = ");
        qb.push_bind(Utc::now());
        if let Some(title) = patch.title {
            qb.push(", title = ").push_bind(title);
        }
        if let Some(description) = patch.description {
            qb.push(", description = ").push_bind(description);
        }
        if let Some(category) = patch.category {
            qb.push(", category = ").push_bind(category);
        }
        if let Some(priority) = patch.priority {
            qb.push(", priority = ").push_bind(priority);
        }
        if let Some(status) = patch.status {
            qb.push(", status = ").push_bind(status);
        }
        if let Some(loc) = patch.location {
            qb.push(", building_id = ").push_bind(loc.building_id);
            qb.push(", floor_id = ").push_bind(loc.floor_id);
            qb.push(", room_id = ").push_bind(loc.room_id);
            qb.push(", area_id = ").push_bind(loc.area_id);
            qb.push(", element_id = ").push_bind(loc.element_id);
            qb.push(", building_name = ").push_bind(loc.building_name);
            qb.push(", floor_name = ").push_bind(loc.floor_name);
            qb.push(", room_name = ").push_bind(loc.room_name);
            qb.push(", area_name = ").push_bind(loc.area_name);
            qb.push(", element_name = ").push_bind(loc.element_name);
        }
        if let Some(assignee_id) = patch.assignee_id {
            qb.push(", assignee_id = ").push_bind(assignee_id);
        }
        if let Some(approver_id) = patch.approver_id {
            qb.push(", approver_id = ").push_bind(approver_id);
        }
        if let Some(department_id) = patch.department_id {
            qb.push(", department_id = ").push_bind(department_id);
        }
        if let Some(resolved_at) = patch.resolved_at {
            qb.push(", resolved_at = ").push_bind(resolved_at);
        }
        if let Some(closed_at) = patch.closed_at {
            qb.push(", closed_at = ").push_bind(closed_at);
        }
        qb.push(" WHERE id = ").push_bind(id);
        qb.push(" RETURNING *");
        qb.build_query_as::<Ticket>()
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("ticket {}", id)))
    }

    async fn delete_ticket(&self, id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM tickets WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("ticket {}", id)));
        }
        Ok(())
    }

    async fn insert_comment(
        &self,
        ticket_id: i64,
        author_id: i64,
        body: &str,
    ) -> Result<TicketComment, StoreError> {
        Ok(sqlx::query_as::<_, TicketComment>(
            "INSERT INTO ticket_comments (ticket_id, author_id, body) \
             VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(ticket_id)
        .bind(author_id)
        .bind(body)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn comments_for_ticket(&self, ticket_id: i64) -> Result<Vec<TicketComment>, StoreError> {
        Ok(sqlx::query_as::<_, TicketComment>(
            "SELECT * FROM ticket_comments WHERE ticket_id = $1 ORDER BY id",
        )
        .bind(ticket_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn delete_comments_for_ticket(&self, ticket_id: i64) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM ticket_comments WHERE ticket_id = $1")
            .bind(ticket_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn insert_attachment(&self, att: NewAttachment) -> Result<AttachmentMeta, StoreError> {
        Ok(sqlx::query_as::<_, AttachmentMeta>(
            "INSERT INTO attachments \
             (ticket_id, filename, content_type, size_bytes, data, uploaded_by) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING id, ticket_id, filename, content_type, size_bytes, uploaded_by, created_at",
        )
        .bind(att.ticket_id)
        .bind(&att.filename)
        .bind(&att.content_type)
        .bind(att.data.len() as i64)
        .bind(&att.data)
        .bind(att.uploaded_by)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn attachment_by_id(
        &self,
        ticket_id: i64,
        id: i64,
    ) -> Result<Option<Attachment>, StoreError> {
        Ok(sqlx::query_as::<_, Attachment>(
            "SELECT * FROM attachments WHERE id = $1 AND ticket_id = $2",
        )
        .bind(id)
        .bind(ticket_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn attachments_for_ticket(
        &self,
        ticket_id: i64,
    ) -> Result<Vec<AttachmentMeta>, StoreError> {
        Ok(sqlx::query_as::<_, AttachmentMeta>(
            "SELECT id, ticket_id, filename, content_type, size_bytes, uploaded_by, created_at \
             FROM attachments WHERE ticket_id = $1 ORDER BY id",
        )
        .bind(ticket_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn delete_attachments_for_ticket(&self, ticket_id: i64) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM attachments WHERE ticket_id = $1")
            .bind(ticket_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn insert_history(&self, entries: Vec<NewHistoryEntry>) -> Result<(), StoreError> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO ticket_history (ticket_id, actor_id, field, old_value, new_value) ",
        );
        qb.push_values(entries, |mut row, entry| {
            row.push_bind(entry.ticket_id)
                .push_bind(entry.actor_id)
                .push_bind(entry.field)
                .push_bind(entry.old_value)
                .push_bind(entry.new_value);
        });
        qb.build().execute(&self.pool).await?;
        Ok(())
    }

    async fn history_for_ticket(
        &self,
        ticket_id: i64,
    ) -> Result<Vec<TicketHistoryEntry>, StoreError> {
        Ok(sqlx::query_as::<_, TicketHistoryEntry>(
            "SELECT * FROM ticket_history WHERE ticket_id = $1 ORDER BY id",
        )
        .bind(ticket_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn delete_history_for_ticket(&self, ticket_id: i64) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM ticket_history WHERE ticket_id = $1")
            .bind(ticket_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
