//! Storage factory for runtime backend selection

use std::sync::Arc;

use tracing::info;

use crate::config::StorageConfig;
use crate::domain::user::UserStore;
use crate::domain::DomainError;
use crate::infrastructure::user::{InMemoryUserStore, PostgresUserStore};

use super::migrations::run_storage_migrations;
use super::postgres::{connect_pool, PostgresConfig};

/// Supported storage types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageType {
    /// In-memory storage (for testing/development)
    InMemory,
    /// PostgreSQL storage
    Postgres,
}

impl StorageType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "memory" | "inmemory" | "in-memory" | "in_memory" => Some(Self::InMemory),
            "postgres" | "postgresql" | "pg" => Some(Self::Postgres),
            _ => None,
        }
    }

    /// Resolve the backend named in configuration
    pub fn from_config(config: &StorageConfig) -> Result<Self, DomainError> {
        Self::from_str(&config.backend).ok_or_else(|| {
            DomainError::configuration(format!("Unknown storage backend '{}'", config.backend))
        })
    }
}

/// Factory for creating user stores
#[derive(Debug)]
pub struct StorageFactory;

impl StorageFactory {
    /// Create the configured user store.
    ///
    /// The Postgres backend applies pending migrations first, so the unique
    /// email index exists before any write.
    pub async fn create_user_store(
        config: &StorageConfig,
    ) -> Result<Arc<dyn UserStore>, DomainError> {
        match StorageType::from_config(config)? {
            StorageType::InMemory => {
                info!("using in-memory user store");
                Ok(Arc::new(InMemoryUserStore::new()))
            }
            StorageType::Postgres => {
                let pool = connect_pool(&PostgresConfig::from_storage_config(config)?).await?;
                run_storage_migrations(&pool).await?;
                info!("using PostgreSQL user store");
                Ok(Arc::new(PostgresUserStore::new(pool)))
            }
        }
    }

    /// Apply pending migrations for the configured backend.
    ///
    /// Returns the number of migrations applied; always zero in memory.
    pub async fn migrate(config: &StorageConfig) -> Result<usize, DomainError> {
        match StorageType::from_config(config)? {
            StorageType::InMemory => Ok(0),
            StorageType::Postgres => {
                let pool = connect_pool(&PostgresConfig::from_storage_config(config)?).await?;
                run_storage_migrations(&pool).await
            }
        }
    }
}
