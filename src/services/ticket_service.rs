use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;

use crate::config;
use crate::database::models::{
    Attachment, AttachmentMeta, NewAttachment, NewHistoryEntry, NewTicket, Ticket, TicketComment,
    TicketFilter, TicketHistoryEntry, TicketPatch, TicketStatus,
};
use crate::database::store::Store;
use crate::error::ApiError;
use crate::location::{self, LocationInput};
use crate::middleware::AuthUser;
use crate::policy::{self, transitions, TicketUpdate};

/// Creation payload. The creator reference is never taken from here; it is
/// forced to the authenticated actor.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTicket {
    pub title: String,
    pub description: String,
    pub category: crate::database::models::TicketCategory,
    pub priority: crate::database::models::TicketPriority,
    pub status: Option<TicketStatus>,
    pub assignee_id: Option<i64>,
    pub department_id: Option<i64>,
    pub location: LocationInput,
}

/// Ticket workflow orchestration: resolve location, apply policy, stamp
/// transition timestamps, persist, record history.
pub struct TicketService {
    store: Arc<dyn Store>,
}

impl TicketService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    async fn fetch(&self, id: i64) -> Result<Ticket, ApiError> {
        self.store
            .ticket_by_id(id)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("ticket {} not found", id)))
    }

    /// Fetch a ticket the actor is allowed to see.
    async fn fetch_visible(&self, actor: &AuthUser, id: i64) -> Result<Ticket, ApiError> {
        let ticket = self.fetch(id).await?;
        if !policy::can_view(actor, &ticket) {
            return Err(ApiError::forbidden("not your ticket"));
        }
        Ok(ticket)
    }

    pub async fn create(&self, actor: &AuthUser, req: CreateTicket) -> Result<Ticket, ApiError> {
        if req.title.trim().is_empty() {
            return Err(ApiError::field_error("title", "This field is required"));
        }
        if req.description.trim().is_empty() {
            return Err(ApiError::field_error("description", "This field is required"));
        }

        let resolved = location::resolve(self.store.as_ref(), &req.location).await?;

        let status = policy::initial_status(actor, req.status);
        let assignee_id = if policy::can_pretriage(actor) {
            req.assignee_id
        } else {
            None
        };
        if let Some(assignee) = assignee_id {
            self.require_user(assignee, "assignee_id").await?;
        }
        // Tickets default into the creator's department so department
        // managers see what their people file
        let department_id = req.department_id.or(actor.department_id);

        let ticket = self
            .store
            .insert_ticket(NewTicket {
                title: req.title,
                description: req.description,
                category: req.category,
                priority: req.priority,
                status,
                location: resolved,
                created_by: actor.user_id,
                assignee_id,
                department_id,
            })
            .await?;
        Ok(ticket)
    }

    pub async fn get(&self, actor: &AuthUser, id: i64) -> Result<Ticket, ApiError> {
        self.fetch_visible(actor, id).await
    }

    pub async fn list(
        &self,
        actor: &AuthUser,
        filter: TicketFilter,
    ) -> Result<Vec<Ticket>, ApiError> {
        let scope = policy::visibility_scope(actor);
        Ok(self.store.list_tickets(&scope, &filter).await?)
    }

    pub async fn update(
        &self,
        actor: &AuthUser,
        id: i64,
        update: TicketUpdate,
    ) -> Result<Ticket, ApiError> {
        let ticket = self.fetch(id).await?;
        policy::authorize_update(actor, &ticket, &update)?;

        let mut patch = TicketPatch::default();

        if let Some(status) = update.status {
            transitions::check(actor.role, ticket.status, status)?;
            if status != ticket.status {
                patch.status = Some(status);
                // Stamped on the transition into the state, once only
                if status == TicketStatus::Resolved && ticket.resolved_at.is_none() {
                    patch.resolved_at = Some(Utc::now());
                }
                if status == TicketStatus::Closed && ticket.closed_at.is_none() {
                    patch.closed_at = Some(Utc::now());
                }
            }
        }

        if let Some(input) = &update.location {
            patch.location = Some(location::resolve(self.store.as_ref(), input).await?);
        }

        if let Some(title) = update.title {
            if title.trim().is_empty() {
                return Err(ApiError::field_error("title", "This field is required"));
            }
            patch.title = Some(title);
        }
        if let Some(description) = update.description {
            patch.description = Some(description);
        }
        patch.category = update.category;
        patch.priority = update.priority;

        if let Some(assignee) = update.assignee_id {
            if let Some(assignee_id) = assignee {
                self.require_user(assignee_id, "assignee_id").await?;
            }
            patch.assignee_id = Some(assignee);
        }
        if let Some(approver) = update.approver_id {
            if let Some(approver_id) = approver {
                self.require_user(approver_id, "approver_id").await?;
            }
            patch.approver_id = Some(approver);
        }
        if let Some(department) = update.department_id {
            patch.department_id = Some(department);
        }

        if patch.is_empty() {
            return Ok(ticket);
        }

        let updated = self.store.update_ticket(id, patch).await?;
        let entries = history_diff(actor, &ticket, &updated);
        self.store.insert_history(entries).await?;
        Ok(updated)
    }

    /// Admin-only hard delete. The cascade to comments, attachments and
    /// history happens here; not every deployment enforces it at the
    /// database level.
    pub async fn delete(&self, actor: &AuthUser, id: i64) -> Result<(), ApiError> {
        policy::authorize_delete(actor)?;
        self.fetch(id).await?;
        self.store.delete_comments_for_ticket(id).await?;
        self.store.delete_attachments_for_ticket(id).await?;
        self.store.delete_history_for_ticket(id).await?;
        self.store.delete_ticket(id).await?;
        Ok(())
    }

    pub async fn add_comment(
        &self,
        actor: &AuthUser,
        ticket_id: i64,
        body: &str,
    ) -> Result<TicketComment, ApiError> {
        if body.trim().is_empty() {
            return Err(ApiError::field_error("body", "This field is required"));
        }
        self.fetch_visible(actor, ticket_id).await?;
        Ok(self
            .store
            .insert_comment(ticket_id, actor.user_id, body)
            .await?)
    }

    pub async fn comments(
        &self,
        actor: &AuthUser,
        ticket_id: i64,
    ) -> Result<Vec<TicketComment>, ApiError> {
        self.fetch_visible(actor, ticket_id).await?;
        Ok(self.store.comments_for_ticket(ticket_id).await?)
    }

    pub async fn add_attachment(
        &self,
        actor: &AuthUser,
        ticket_id: i64,
        filename: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<AttachmentMeta, ApiError> {
        if filename.trim().is_empty() {
            return Err(ApiError::field_error("filename", "This field is required"));
        }
        let max = config::config().api.max_attachment_bytes;
        if data.len() > max {
            return Err(ApiError::payload_too_large(format!(
                "attachment exceeds the {} byte limit",
                max
            )));
        }
        self.fetch_visible(actor, ticket_id).await?;
        Ok(self
            .store
            .insert_attachment(NewAttachment {
                ticket_id,
                filename: filename.to_string(),
                content_type: content_type.to_string(),
                data,
                uploaded_by: Some(actor.user_id),
            })
            .await?)
    }

    pub async fn attachments(
        &self,
        actor: &AuthUser,
        ticket_id: i64,
    ) -> Result<Vec<AttachmentMeta>, ApiError> {
        self.fetch_visible(actor, ticket_id).await?;
        Ok(self.store.attachments_for_ticket(ticket_id).await?)
    }

    pub async fn attachment(
        &self,
        actor: &AuthUser,
        ticket_id: i64,
        attachment_id: i64,
    ) -> Result<Attachment, ApiError> {
        self.fetch_visible(actor, ticket_id).await?;
        self.store
            .attachment_by_id(ticket_id, attachment_id)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("attachment {} not found", attachment_id)))
    }

    pub async fn history(
        &self,
        actor: &AuthUser,
        ticket_id: i64,
    ) -> Result<Vec<TicketHistoryEntry>, ApiError> {
        self.fetch_visible(actor, ticket_id).await?;
        Ok(self.store.history_for_ticket(ticket_id).await?)
    }

    async fn require_user(&self, user_id: i64, field: &str) -> Result<(), ApiError> {
        if self.store.user_by_id(user_id).await?.is_none() {
            return Err(ApiError::field_error(field, format!("unknown user {}", user_id)));
        }
        Ok(())
    }
}

fn location_path(ticket: &Ticket) -> String {
    format!(
        "{} / {} / {} / {} / {}",
        ticket.building_name,
        ticket.floor_name,
        ticket.room_name,
        ticket.area_name,
        ticket.element_name
    )
}

/// One history row per changed field.
fn history_diff(actor: &AuthUser, old: &Ticket, new: &Ticket) -> Vec<NewHistoryEntry> {
    let mut entries = Vec::new();
    let mut push = |field: &str, old_value: Option<String>, new_value: Option<String>| {
        if old_value != new_value {
            entries.push(NewHistoryEntry {
                ticket_id: old.id,
                actor_id: actor.user_id,
                field: field.to_string(),
                old_value,
                new_value,
            });
        }
    };

    push(
        "status",
        Some(old.status.as_str().to_string()),
        Some(new.status.as_str().to_string()),
    );
    push(
        "priority",
        Some(old.priority.as_str().to_string()),
        Some(new.priority.as_str().to_string()),
    );
    push(
        "category",
        Some(old.category.as_str().to_string()),
        Some(new.category.as_str().to_string()),
    );
    push("title", Some(old.title.clone()), Some(new.title.clone()));
    push(
        "description",
        Some(old.description.clone()),
        Some(new.description.clone()),
    );
    push(
        "assignee_id",
        old.assignee_id.map(|v| v.to_string()),
        new.assignee_id.map(|v| v.to_string()),
    );
    push(
        "approver_id",
        old.approver_id.map(|v| v.to_string()),
        new.approver_id.map(|v| v.to_string()),
    );
    push(
        "department_id",
        old.department_id.map(|v| v.to_string()),
        new.department_id.map(|v| v.to_string()),
    );
    push(
        "location",
        Some(location_path(old)),
        Some(location_path(new)),
    );
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemStore;
    use crate::database::models::LocationLevel::*;
    use crate::database::models::{NewUser, Role, TicketCategory, TicketPriority};

    fn actor(user_id: i64, role: Role) -> AuthUser {
        AuthUser {
            user_id,
            username: format!("u{}", user_id),
            role,
            department_id: None,
        }
    }

    async fn seeded_service() -> (TicketService, Arc<MemStore>) {
        let store = Arc::new(MemStore::new());
        let building = store.insert_location(Building, "Building A", None).await.unwrap().id;
        let floor = store
            .insert_location(Floor, "1st Floor", Some(building))
            .await
            .unwrap()
            .id;
        let room = store
            .insert_location(Room, "101 - Office", Some(floor))
            .await
            .unwrap()
            .id;
        let area = store
            .insert_location(Area, "Elektroinstalace", Some(room))
            .await
            .unwrap()
            .id;
        store
            .insert_location(Element, "Osvětlení", Some(area))
            .await
            .unwrap();
        (TicketService::new(store.clone()), store)
    }

    async fn seed_user(store: &MemStore, username: &str, role: Role) -> i64 {
        store
            .insert_user(NewUser {
                username: username.to_string(),
                password_hash: "x$y".to_string(),
                full_name: username.to_string(),
                email: format!("{}@example.com", username),
                role,
                department_id: None,
            })
            .await
            .unwrap()
            .id
    }

    fn create_request() -> CreateTicket {
        CreateTicket {
            title: "Light is out".to_string(),
            description: "Office light does not turn on".to_string(),
            category: TicketCategory::Maintenance,
            priority: TicketPriority::Medium,
            status: None,
            assignee_id: None,
            department_id: None,
            location: LocationInput {
                building: Some("Building A".to_string()),
                floor: Some("1st Floor".to_string()),
                room: Some("101 - Office".to_string()),
                area: Some("Elektroinstalace".to_string()),
                element: Some("Osvětlení".to_string()),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn create_forces_creator_and_open_status() {
        let (service, store) = seeded_service().await;
        let submitter = seed_user(&store, "alice", Role::User).await;

        let mut req = create_request();
        // submitter-supplied pre-triage is dropped
        req.status = Some(TicketStatus::Assigned);
        req.assignee_id = Some(999);

        let ticket = service.create(&actor(submitter, Role::User), req).await.unwrap();
        assert_eq!(ticket.created_by, submitter);
        assert_eq!(ticket.status, TicketStatus::Open);
        assert_eq!(ticket.assignee_id, None);
        assert_eq!(ticket.building_name, "Building A");
    }

    #[tokio::test]
    async fn staff_creator_may_pretriage() {
        let (service, store) = seeded_service().await;
        let tech = seed_user(&store, "tina", Role::Technician).await;

        let mut req = create_request();
        req.status = Some(TicketStatus::Assigned);
        req.assignee_id = Some(tech);

        let ticket = service
            .create(&actor(tech, Role::Technician), req)
            .await
            .unwrap();
        assert_eq!(ticket.status, TicketStatus::Assigned);
        assert_eq!(ticket.assignee_id, Some(tech));
    }

    #[tokio::test]
    async fn resolved_at_is_stamped_exactly_once() {
        let (service, store) = seeded_service().await;
        let admin = seed_user(&store, "root", Role::Admin).await;
        let a = actor(admin, Role::Admin);

        let ticket = service.create(&a, create_request()).await.unwrap();

        let update = TicketUpdate {
            status: Some(TicketStatus::Resolved),
            ..Default::default()
        };
        let resolved = service.update(&a, ticket.id, update.clone()).await.unwrap();
        let first_stamp = resolved.resolved_at.expect("resolved_at set on transition");

        // re-sending Resolved must not move the stamp
        let again = service.update(&a, ticket.id, update).await.unwrap();
        assert_eq!(again.resolved_at, Some(first_stamp));

        let closed = service
            .update(
                &a,
                ticket.id,
                TicketUpdate {
                    status: Some(TicketStatus::Closed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(closed.closed_at.is_some());
        assert_eq!(closed.resolved_at, Some(first_stamp));
    }

    #[tokio::test]
    async fn transition_table_is_enforced_for_non_admins() {
        let (service, store) = seeded_service().await;
        let manager = seed_user(&store, "mona", Role::Manager).await;
        let a = actor(manager, Role::Manager);

        let ticket = service.create(&a, create_request()).await.unwrap();
        // Open -> Closed skips the whole pipeline
        let err = service
            .update(
                &a,
                ticket.id,
                TicketUpdate {
                    status: Some(TicketStatus::Closed),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::ValidationError { .. }));
    }

    #[tokio::test]
    async fn update_records_history_rows() {
        let (service, store) = seeded_service().await;
        let admin = seed_user(&store, "root", Role::Admin).await;
        let tech = seed_user(&store, "tina", Role::Technician).await;
        let a = actor(admin, Role::Admin);

        let ticket = service.create(&a, create_request()).await.unwrap();
        service
            .update(
                &a,
                ticket.id,
                TicketUpdate {
                    status: Some(TicketStatus::Assigned),
                    assignee_id: Some(Some(tech)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let history = service.history(&a, ticket.id).await.unwrap();
        let fields: Vec<&str> = history.iter().map(|h| h.field.as_str()).collect();
        assert!(fields.contains(&"status"));
        assert!(fields.contains(&"assignee_id"));
        let status_row = history.iter().find(|h| h.field == "status").unwrap();
        assert_eq!(status_row.old_value.as_deref(), Some("open"));
        assert_eq!(status_row.new_value.as_deref(), Some("assigned"));
    }

    #[tokio::test]
    async fn delete_cascades_to_related_records() {
        let (service, store) = seeded_service().await;
        let admin = seed_user(&store, "root", Role::Admin).await;
        let a = actor(admin, Role::Admin);

        let ticket = service.create(&a, create_request()).await.unwrap();
        service.add_comment(&a, ticket.id, "looking into it").await.unwrap();
        service
            .add_attachment(&a, ticket.id, "photo.jpg", "image/jpeg", vec![1, 2, 3])
            .await
            .unwrap();
        service
            .update(
                &a,
                ticket.id,
                TicketUpdate {
                    status: Some(TicketStatus::Assigned),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        service.delete(&a, ticket.id).await.unwrap();

        assert!(store.ticket_by_id(ticket.id).await.unwrap().is_none());
        assert!(store.comments_for_ticket(ticket.id).await.unwrap().is_empty());
        assert!(store.attachments_for_ticket(ticket.id).await.unwrap().is_empty());
        assert!(store.history_for_ticket(ticket.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_requires_admin() {
        let (service, store) = seeded_service().await;
        let manager = seed_user(&store, "mona", Role::Manager).await;
        let a = actor(manager, Role::Manager);
        let ticket = service.create(&a, create_request()).await.unwrap();
        assert!(service.delete(&a, ticket.id).await.is_err());
    }

    #[tokio::test]
    async fn oversized_attachment_is_rejected() {
        let (service, store) = seeded_service().await;
        let admin = seed_user(&store, "root", Role::Admin).await;
        let a = actor(admin, Role::Admin);
        let ticket = service.create(&a, create_request()).await.unwrap();

        let max = crate::config::config().api.max_attachment_bytes;
        let err = service
            .add_attachment(&a, ticket.id, "huge.bin", "application/octet-stream", vec![0; max + 1])
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::PayloadTooLarge(_)));
    }
}
