pub mod attachment;
pub mod comment;
pub mod history;
pub mod location;
pub mod ticket;
pub mod user;

pub use attachment::{Attachment, AttachmentMeta, NewAttachment};
pub use comment::TicketComment;
pub use history::{NewHistoryEntry, TicketHistoryEntry};
pub use location::{LocationLevel, LocationNode, ResolvedLocation};
pub use ticket::{NewTicket, Ticket, TicketCategory, TicketFilter, TicketPatch, TicketPriority, TicketStatus};
pub use user::{NewUser, Role, User, UserPatch};
