pub mod auth;
pub mod locations;
pub mod tickets;
pub mod users;
