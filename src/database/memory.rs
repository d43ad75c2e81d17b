use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::database::models::{
    Attachment, AttachmentMeta, LocationLevel, LocationNode, NewAttachment, NewHistoryEntry,
    NewTicket, NewUser, Ticket, TicketComment, TicketFilter, TicketHistoryEntry, TicketPatch,
    User, UserPatch,
};
use crate::database::store::{Store, StoreError};
use crate::policy::VisibilityScope;

/// In-memory store. Selected explicitly at startup (`HELPDESK_STORE=memory`);
/// process-local and non-authoritative. Also backs the unit tests.
#[derive(Default)]
pub struct MemStore {
    inner: RwLock<Tables>,
}

#[derive(Default)]
struct Tables {
    next_user_id: i64,
    next_location_id: i64,
    next_ticket_id: i64,
    next_comment_id: i64,
    next_attachment_id: i64,
    next_history_id: i64,
    users: HashMap<i64, User>,
    locations: HashMap<i64, LocationNode>,
    tickets: HashMap<i64, Ticket>,
    comments: HashMap<i64, TicketComment>,
    attachments: HashMap<i64, Attachment>,
    history: HashMap<i64, TicketHistoryEntry>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut t = self.inner.write().await;
        if t.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::Conflict(format!(
                "username '{}' already exists",
                user.username
            )));
        }
        t.next_user_id += 1;
        let now = Utc::now();
        let record = User {
            id: t.next_user_id,
            username: user.username,
            password_hash: user.password_hash,
            full_name: user.full_name,
            email: user.email,
            role: user.role,
            department_id: user.department_id,
            active: true,
            created_at: now,
            updated_at: now,
        };
        t.users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn user_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let mut users: Vec<User> = self.inner.read().await.users.values().cloned().collect();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    async fn update_user(&self, id: i64, patch: UserPatch) -> Result<User, StoreError> {
        let mut t = self.inner.write().await;
        let user = t
            .users
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("user {}", id)))?;
        if let Some(full_name) = patch.full_name {
            user.full_name = full_name;
        }
        if let Some(email) = patch.email {
            user.email = email;
        }
        if let Some(role) = patch.role {
            user.role = role;
        }
        if let Some(department_id) = patch.department_id {
            user.department_id = department_id;
        }
        if let Some(active) = patch.active {
            user.active = active;
        }
        if let Some(password_hash) = patch.password_hash {
            user.password_hash = password_hash;
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn insert_location(
        &self,
        level: LocationLevel,
        name: &str,
        parent_id: Option<i64>,
    ) -> Result<LocationNode, StoreError> {
        let mut t = self.inner.write().await;
        let duplicate = t
            .locations
            .values()
            .any(|n| n.level == level && n.parent_id == parent_id && n.name == name);
        if duplicate {
            return Err(StoreError::Conflict(format!(
                "{} '{}' already exists under this parent",
                level.as_str(),
                name
            )));
        }
        t.next_location_id += 1;
        let now = Utc::now();
        let node = LocationNode {
            id: t.next_location_id,
            level,
            name: name.to_string(),
            parent_id,
            created_at: now,
            updated_at: now,
        };
        t.locations.insert(node.id, node.clone());
        Ok(node)
    }

    async fn location_by_id(
        &self,
        level: LocationLevel,
        id: i64,
    ) -> Result<Option<LocationNode>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .locations
            .get(&id)
            .filter(|n| n.level == level)
            .cloned())
    }

    async fn location_by_name(
        &self,
        level: LocationLevel,
        parent_id: Option<i64>,
        name: &str,
    ) -> Result<Option<LocationNode>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .locations
            .values()
            .find(|n| n.level == level && n.parent_id == parent_id && n.name == name)
            .cloned())
    }

    async fn locations_by_parent(
        &self,
        level: LocationLevel,
        parent_id: Option<i64>,
    ) -> Result<Vec<LocationNode>, StoreError> {
        let mut nodes: Vec<LocationNode> = self
            .inner
            .read()
            .await
            .locations
            .values()
            .filter(|n| n.level == level && (parent_id.is_none() || n.parent_id == parent_id))
            .cloned()
            .collect();
        nodes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(nodes)
    }

    async fn insert_ticket(&self, ticket: NewTicket) -> Result<Ticket, StoreError> {
        let mut t = self.inner.write().await;
        t.next_ticket_id += 1;
        let now = Utc::now();
        let loc = ticket.location;
        let record = Ticket {
            id: t.next_ticket_id,
            title: ticket.title,
            description: ticket.description,
            category: ticket.category,
            priority: ticket.priority,
            status: ticket.status,
            building_id: loc.building_id,
            floor_id: loc.floor_id,
            room_id: loc.room_id,
            area_id: loc.area_id,
            element_id: loc.element_id,
            building_name: loc.building_name,
            floor_name: loc.floor_name,
            room_name: loc.room_name,
            area_name: loc.area_name,
            element_name: loc.element_name,
            created_by: ticket.created_by,
            assignee_id: ticket.assignee_id,
            approver_id: None,
            department_id: ticket.department_id,
            created_at: now,
            updated_at: now,
            resolved_at: None,
            closed_at: None,
        };
        t.tickets.insert(record.id, record.clone());
        Ok(record)
    }

    async fn ticket_by_id(&self, id: i64) -> Result<Option<Ticket>, StoreError> {
        Ok(self.inner.read().await.tickets.get(&id).cloned())
    }

    async fn list_tickets(
        &self,
        scope: &VisibilityScope,
        filter: &TicketFilter,
    ) -> Result<Vec<Ticket>, StoreError> {
        let mut tickets: Vec<Ticket> = self
            .inner
            .read()
            .await
            .tickets
            .values()
            .filter(|t| scope.matches(t))
            .filter(|t| filter.status.map_or(true, |s| t.status == s))
            .filter(|t| filter.category.map_or(true, |c| t.category == c))
            .filter(|t| filter.priority.map_or(true, |p| t.priority == p))
            .cloned()
            .collect();
        tickets.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(tickets)
    }

    async fn update_ticket(&self, id: i64, patch: TicketPatch) -> Result<Ticket, StoreError> {
        let mut t = self.inner.write().await;
        let ticket = t
            .tickets
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("ticket {}", id)))?;
        if let Some(title) = patch.title {
            ticket.title = title;
        }
        if let Some(description) = patch.description {
            ticket.description = description;
        }
        if let Some(category) = patch.category {
            ticket.category = category;
        }
        if let Some(priority) = patch.priority {
            ticket.priority = priority;
        }
        if let Some(status) = patch.status {
            ticket.status = status;
        }
        if let Some(loc) = patch.location {
            ticket.building_id = loc.building_id;
            ticket.floor_id = loc.floor_id;
            ticket.room_id = loc.room_id;
            ticket.area_id = loc.area_id;
            ticket.element_id = loc.element_id;
            ticket.building_name = loc.building_name;
            ticket.floor_name = loc.floor_name;
            ticket.room_name = loc.room_name;
            ticket.area_name = loc.area_name;
            ticket.element_name = loc.element_name;
        }
        if let Some(assignee_id) = patch.assignee_id {
            ticket.assignee_id = assignee_id;
        }
        if let Some(approver_id) = patch.approver_id {
            ticket.approver_id = approver_id;
        }
        if let Some(department_id) = patch.department_id {
            ticket.department_id = department_id;
        }
        if let Some(resolved_at) = patch.resolved_at {
            ticket.resolved_at = Some(resolved_at);
        }
        if let Some(closed_at) = patch.closed_at {
            ticket.closed_at = Some(closed_at);
        }
        ticket.updated_at = Utc::now();
        Ok(ticket.clone())
    }

    async fn delete_ticket(&self, id: i64) -> Result<(), StoreError> {
        let mut t = self.inner.write().await;
        t.tickets
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("ticket {}", id)))
    }

    async fn insert_comment(
        &self,
        ticket_id: i64,
        author_id: i64,
        body: &str,
    ) -> Result<TicketComment, StoreError> {
        let mut t = self.inner.write().await;
        t.next_comment_id += 1;
        let record = TicketComment {
            id: t.next_comment_id,
            ticket_id,
            author_id,
            body: body.to_string(),
            created_at: Utc::now(),
        };
        t.comments.insert(record.id, record.clone());
        Ok(record)
    }

    async fn comments_for_ticket(&self, ticket_id: i64) -> Result<Vec<TicketComment>, StoreError> {
        let mut comments: Vec<TicketComment> = self
            .inner
            .read()
            .await
            .comments
            .values()
            .filter(|c| c.ticket_id == ticket_id)
            .cloned()
            .collect();
        comments.sort_by_key(|c| c.id);
        Ok(comments)
    }

    async fn delete_comments_for_ticket(&self, ticket_id: i64) -> Result<u64, StoreError> {
        let mut t = self.inner.write().await;
        let before = t.comments.len();
        t.comments.retain(|_, c| c.ticket_id != ticket_id);
        Ok((before - t.comments.len()) as u64)
    }

    async fn insert_attachment(&self, att: NewAttachment) -> Result<AttachmentMeta, StoreError> {
        let mut t = self.inner.write().await;
        t.next_attachment_id += 1;
        let record = Attachment {
            id: t.next_attachment_id,
            ticket_id: att.ticket_id,
            filename: att.filename,
            content_type: att.content_type,
            size_bytes: att.data.len() as i64,
            data: att.data,
            uploaded_by: att.uploaded_by,
            created_at: Utc::now(),
        };
        let meta = AttachmentMeta::from(&record);
        t.attachments.insert(record.id, record);
        Ok(meta)
    }

    async fn attachment_by_id(
        &self,
        ticket_id: i64,
        id: i64,
    ) -> Result<Option<Attachment>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .attachments
            .get(&id)
            .filter(|a| a.ticket_id == ticket_id)
            .cloned())
    }

    async fn attachments_for_ticket(
        &self,
        ticket_id: i64,
    ) -> Result<Vec<AttachmentMeta>, StoreError> {
        let mut metas: Vec<AttachmentMeta> = self
            .inner
            .read()
            .await
            .attachments
            .values()
            .filter(|a| a.ticket_id == ticket_id)
            .map(AttachmentMeta::from)
            .collect();
        metas.sort_by_key(|a| a.id);
        Ok(metas)
    }

    async fn delete_attachments_for_ticket(&self, ticket_id: i64) -> Result<u64, StoreError> {
        let mut t = self.inner.write().await;
        let before = t.attachments.len();
        t.attachments.retain(|_, a| a.ticket_id != ticket_id);
        Ok((before - t.attachments.len()) as u64)
    }

    async fn insert_history(&self, entries: Vec<NewHistoryEntry>) -> Result<(), StoreError> {
        let mut t = self.inner.write().await;
        for entry in entries {
            t.next_history_id += 1;
            let record = TicketHistoryEntry {
                id: t.next_history_id,
                ticket_id: entry.ticket_id,
                actor_id: entry.actor_id,
                field: entry.field,
                old_value: entry.old_value,
                new_value: entry.new_value,
                created_at: Utc::now(),
            };
            t.history.insert(record.id, record);
        }
        Ok(())
    }

    async fn history_for_ticket(
        &self,
        ticket_id: i64,
    ) -> Result<Vec<TicketHistoryEntry>, StoreError> {
        let mut entries: Vec<TicketHistoryEntry> = self
            .inner
            .read()
            .await
            .history
            .values()
            .filter(|h| h.ticket_id == ticket_id)
            .cloned()
            .collect();
        entries.sort_by_key(|h| h.id);
        Ok(entries)
    }

    async fn delete_history_for_ticket(&self, ticket_id: i64) -> Result<u64, StoreError> {
        let mut t = self.inner.write().await;
        let before = t.history.len();
        t.history.retain(|_, h| h.ticket_id != ticket_id);
        Ok((before - t.history.len()) as u64)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
