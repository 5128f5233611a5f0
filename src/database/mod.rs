pub mod manager;
pub mod memory;
pub mod postgres;
pub mod repository;
pub mod store;

use std::sync::Arc;

use tracing::info;

use crate::config::{DatabaseConfig, StorageBackend};

pub use manager::{DatabaseError, DatabaseManager};
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use repository::{to_row, Entity, Repository};
pub use store::{Bucket, Row, Store};

/// Bundled DDL for every table the API serves
pub const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Build the configured store
pub async fn open_store(config: &DatabaseConfig) -> Result<Arc<dyn Store>, DatabaseError> {
    match config.backend {
        StorageBackend::Memory => {
            info!("Using in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StorageBackend::Postgres => {
            let pool = DatabaseManager::connect(config).await?;
            Ok(Arc::new(PgStore::new(pool)))
        }
    }
}
