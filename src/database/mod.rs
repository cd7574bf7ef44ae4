pub mod entities;
pub mod manager;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod record;
pub mod repository;
pub mod store;

use std::sync::Arc;

pub use entities::{ChildRelation, EntityDef};
pub use manager::{DatabaseError, DatabaseManager};
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use record::{Record, RecordError};
pub use repository::{Repository, RepositoryError, RestoreOutcome};
pub use store::{Store, StoreTransaction};

/// URL scheme selecting the in-process store
pub const MEMORY_URL: &str = "memory://";

/// Open the configured backend: PostgreSQL for `postgres://` URLs, the in-memory store otherwise
pub async fn connect_store(url: Option<&str>) -> Result<Arc<dyn Store>, DatabaseError> {
    match url {
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store");
            Ok(memory_store())
        }
        Some(url) if url.starts_with(MEMORY_URL) => Ok(memory_store()),
        Some(url) => {
            let store = PgStore::connect(url).await?;
            tracing::info!("Connected to {}", DatabaseManager::redact(url));
            Ok(Arc::new(store))
        }
    }
}

fn memory_store() -> Arc<dyn Store> {
    if crate::is_production!() {
        tracing::warn!("In-memory store in production: data will not survive a restart");
    }
    Arc::new(MemoryStore::new())
}
