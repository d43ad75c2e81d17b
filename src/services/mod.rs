pub mod ticket_service;
pub mod user_service;

pub use ticket_service::{CreateTicket, TicketService};
pub use user_service::UserService;
