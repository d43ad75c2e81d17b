//! Explicit ticket status state machine.
//!
//! Status changes are checked against an allowed source→target table before
//! persistence instead of being free-form enum writes. Re-sending the
//! current status is a no-op, not a transition, so it never trips the table
//! and never re-stamps timestamps. Admins may force any transition.

use crate::database::models::{Role, TicketStatus};
use crate::error::ApiError;

/// Allowed transitions:
/// Open → {Assigned, Rejected}
/// Assigned → {InProgress, OnHold, Rejected}
/// InProgress ↔ OnHold, both → {Resolved, Approved}
/// {Resolved, Approved} → Closed
/// Rejected and Closed are terminal.
pub fn is_allowed(from: TicketStatus, to: TicketStatus) -> bool {
    use TicketStatus::*;
    matches!(
        (from, to),
        (Open, Assigned)
            | (Open, Rejected)
            | (Assigned, InProgress)
            | (Assigned, OnHold)
            | (Assigned, Rejected)
            | (InProgress, OnHold)
            | (InProgress, Resolved)
            | (InProgress, Approved)
            | (OnHold, InProgress)
            | (OnHold, Resolved)
            | (OnHold, Approved)
            | (Resolved, Closed)
            | (Approved, Closed)
    )
}

/// Check a requested status change for an actor. Assumes the actor already
/// holds update permission on the ticket.
pub fn check(role: Role, from: TicketStatus, to: TicketStatus) -> Result<(), ApiError> {
    if from == to {
        return Ok(());
    }
    if role == Role::Admin {
        return Ok(());
    }
    if is_allowed(from, to) {
        Ok(())
    } else {
        Err(ApiError::field_error(
            "status",
            format!("cannot transition from {} to {}", from.as_str(), to.as_str()),
        ))
    }
}
