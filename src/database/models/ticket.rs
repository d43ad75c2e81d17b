use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::location::ResolvedLocation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "ticket_category", rename_all = "snake_case")]
pub enum TicketCategory {
    It,
    Maintenance,
    Production,
    Security,
    Administrative,
}

impl TicketCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            TicketCategory::It => "it",
            TicketCategory::Maintenance => "maintenance",
            TicketCategory::Production => "production",
            TicketCategory::Security => "security",
            TicketCategory::Administrative => "administrative",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "ticket_priority", rename_all = "snake_case")]
pub enum TicketPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl TicketPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            TicketPriority::Low => "low",
            TicketPriority::Medium => "medium",
            TicketPriority::High => "high",
            TicketPriority::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "ticket_status", rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    Assigned,
    InProgress,
    OnHold,
    Resolved,
    Closed,
    Approved,
    Rejected,
}

impl TicketStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::Assigned => "assigned",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::OnHold => "on_hold",
            TicketStatus::Resolved => "resolved",
            TicketStatus::Closed => "closed",
            TicketStatus::Approved => "approved",
            TicketStatus::Rejected => "rejected",
        }
    }

    /// Terminal states admit no further transitions (admin override aside).
    pub fn is_terminal(self) -> bool {
        matches!(self, TicketStatus::Closed | TicketStatus::Rejected)
    }
}

/// A persisted ticket. The five location ids are mutually consistent by
/// construction (only the resolver produces them); the display names are
/// denormalized copies taken at resolution time.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Ticket {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub category: TicketCategory,
    pub priority: TicketPriority,
    pub status: TicketStatus,
    pub building_id: i64,
    pub floor_id: i64,
    pub room_id: i64,
    pub area_id: i64,
    pub element_id: i64,
    pub building_name: String,
    pub floor_name: String,
    pub room_name: String,
    pub area_name: String,
    pub element_name: String,
    pub created_by: i64,
    pub assignee_id: Option<i64>,
    pub approver_id: Option<i64>,
    pub department_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// Insert shape, built by the ticket service after resolution and policy
/// checks. `created_by` is always the authenticated actor.
#[derive(Debug, Clone)]
pub struct NewTicket {
    pub title: String,
    pub description: String,
    pub category: TicketCategory,
    pub priority: TicketPriority,
    pub status: TicketStatus,
    pub location: ResolvedLocation,
    pub created_by: i64,
    pub assignee_id: Option<i64>,
    pub department_id: Option<i64>,
}

/// Partial-field update passed to the store. Outer None leaves the column
/// untouched; the nested Options on the reference fields distinguish
/// clearing (set NULL) from leaving alone. `resolved_at` / `closed_at` are
/// stamped by the service on the matching status transition, never taken
/// from the client.
#[derive(Debug, Clone, Default)]
pub struct TicketPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<TicketCategory>,
    pub priority: Option<TicketPriority>,
    pub status: Option<TicketStatus>,
    pub location: Option<ResolvedLocation>,
    pub assignee_id: Option<Option<i64>>,
    pub approver_id: Option<Option<i64>>,
    pub department_id: Option<Option<i64>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl TicketPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.priority.is_none()
            && self.status.is_none()
            && self.location.is_none()
            && self.assignee_id.is_none()
            && self.approver_id.is_none()
            && self.department_id.is_none()
            && self.resolved_at.is_none()
            && self.closed_at.is_none()
    }
}

/// Optional list filters carried alongside the visibility scope.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TicketFilter {
    pub status: Option<TicketStatus>,
    pub category: Option<TicketCategory>,
    pub priority: Option<TicketPriority>,
}
