pub mod memory;
pub mod models;
pub mod pg;
pub mod store;

pub use memory::MemStore;
pub use pg::PgStore;
pub use store::{Store, StoreError};
