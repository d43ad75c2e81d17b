use std::sync::Arc;

use crate::config::{self, StoreBackend};
use crate::database::store::{Store, StoreError};
use crate::database::{MemStore, PgStore};
use crate::services::{TicketService, UserService};

/// Shared application state: the one store implementation chosen at
/// startup. There is no runtime fallback between backends; if the
/// configured store cannot be reached, startup fails.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn from_config() -> Result<Self, StoreError> {
        let store: Arc<dyn Store> = match config::config().store {
            StoreBackend::Postgres => Arc::new(PgStore::connect().await?),
            StoreBackend::Memory => {
                tracing::warn!(
                    "memory store selected; data is process-local and will not survive restart"
                );
                Arc::new(MemStore::new())
            }
        };
        Ok(Self::new(store))
    }

    pub fn tickets(&self) -> TicketService {
        TicketService::new(self.store.clone())
    }

    pub fn users(&self) -> UserService {
        UserService::new(self.store.clone())
    }
}
