//! Role-based ticket visibility and mutation authorization.
//!
//! Evaluated per-request against the authenticated actor's role and, for
//! updates, the target ticket's current assignment state. Pure functions:
//! the storage layer receives a [`VisibilityScope`] for list queries so the
//! filtering happens in the store rather than after the fact.

pub mod transitions;

use serde::{Deserialize, Deserializer};

use crate::database::models::{
    Role, Ticket, TicketCategory, TicketPriority, TicketStatus,
};
use crate::error::ApiError;
use crate::location::LocationInput;
use crate::middleware::AuthUser;

/// Which tickets an actor may see. Translated into a storage filter for
/// lists; [`can_view`] applies the same rule to a single record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisibilityScope {
    /// admin: everything
    All,
    /// user: only tickets they created
    CreatedBy(i64),
    /// technician: their assignments plus the unassigned pool
    AssignedToOrUnassigned(i64),
    /// manager: tickets within their department (department-less managers
    /// match department-less tickets)
    Department(Option<i64>),
}

impl VisibilityScope {
    pub fn matches(&self, ticket: &Ticket) -> bool {
        match self {
            VisibilityScope::All => true,
            VisibilityScope::CreatedBy(user_id) => ticket.created_by == *user_id,
            VisibilityScope::AssignedToOrUnassigned(user_id) => {
                ticket.assignee_id.map_or(true, |assignee| assignee == *user_id)
            }
            VisibilityScope::Department(department_id) => {
                ticket.department_id == *department_id
            }
        }
    }
}

pub fn visibility_scope(actor: &AuthUser) -> VisibilityScope {
    match actor.role {
        Role::Admin => VisibilityScope::All,
        Role::Manager => VisibilityScope::Department(actor.department_id),
        Role::Technician => VisibilityScope::AssignedToOrUnassigned(actor.user_id),
        Role::User => VisibilityScope::CreatedBy(actor.user_id),
    }
}

pub fn can_view(actor: &AuthUser, ticket: &Ticket) -> bool {
    visibility_scope(actor).matches(ticket)
}

/// Initial status on creation: always Open for submitters; manager and
/// technician creators may pre-triage with a status of their choosing.
pub fn initial_status(actor: &AuthUser, requested: Option<TicketStatus>) -> TicketStatus {
    match actor.role {
        Role::Manager | Role::Technician | Role::Admin => {
            requested.unwrap_or(TicketStatus::Open)
        }
        Role::User => TicketStatus::Open,
    }
}

/// Pre-triage fields (status, assignee) in a creation payload are honored
/// only for staff creators; submitter-supplied values are dropped.
pub fn can_pretriage(actor: &AuthUser) -> bool {
    actor.role >= Role::Technician
}

// Missing field -> None, explicit null -> Some(None), value -> Some(Some(v))
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

/// Partial-update payload for PATCH /api/tickets/:id. The nested Options on
/// the reference fields distinguish "clear it" (explicit null) from "leave
/// it alone" (absent).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TicketUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<TicketCategory>,
    pub priority: Option<TicketPriority>,
    pub status: Option<TicketStatus>,
    pub location: Option<LocationInput>,
    #[serde(default, deserialize_with = "double_option")]
    pub assignee_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub approver_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub department_id: Option<Option<i64>>,
}

impl TicketUpdate {
    fn touches_triage_fields(&self) -> bool {
        self.status.is_some() || self.assignee_id.is_some() || self.approver_id.is_some()
    }
}

/// Gate an update attempt. First matching rule decides; a denial covers the
/// entire payload (no partial apply).
pub fn authorize_update(
    actor: &AuthUser,
    ticket: &Ticket,
    update: &TicketUpdate,
) -> Result<(), ApiError> {
    match actor.role {
        Role::User => {
            if update.touches_triage_fields() {
                return Err(ApiError::forbidden(
                    "submitters may not change status, assignee or approver",
                ));
            }
            if update.priority.is_some() || update.department_id.is_some() {
                return Err(ApiError::forbidden(
                    "submitters may only change title, description, category and location",
                ));
            }
            if ticket.created_by != actor.user_id {
                return Err(ApiError::forbidden("not your ticket"));
            }
            Ok(())
        }
        Role::Technician => match ticket.assignee_id {
            None => Ok(()),
            Some(assignee) if assignee == actor.user_id => Ok(()),
            Some(_) => Err(ApiError::forbidden("ticket is assigned to another technician")),
        },
        Role::Manager | Role::Admin => Ok(()),
    }
}

/// Hard delete is admin-only; the service layer is responsible for cascading
/// to comments, attachments and history.
pub fn authorize_delete(actor: &AuthUser) -> Result<(), ApiError> {
    if actor.role == Role::Admin {
        Ok(())
    } else {
        Err(ApiError::forbidden("only administrators may delete tickets"))
    }
}

/// Location administration and user administration are admin-only.
pub fn authorize_admin(actor: &AuthUser) -> Result<(), ApiError> {
    if actor.role == Role::Admin {
        Ok(())
    } else {
        Err(ApiError::forbidden("administrator role required"))
    }
}
