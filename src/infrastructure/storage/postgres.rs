//! PostgreSQL connection pooling

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{error, info};

use crate::config::StorageConfig;
use crate::domain::DomainError;

/// PostgreSQL connection settings
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of connections to maintain
    pub min_connections: u32,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// Idle timeout in seconds
    pub idle_timeout_secs: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/user_records".to_string(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 30,
            idle_timeout_secs: 600,
        }
    }
}

impl PostgresConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Build from the application storage section; a database URL is required
    pub fn from_storage_config(config: &StorageConfig) -> Result<Self, DomainError> {
        let url = config.database_url.as_deref().ok_or_else(|| {
            DomainError::configuration("storage.database_url is required for the postgres backend")
        })?;

        Ok(Self::new(url)
            .with_max_connections(config.max_connections)
            .with_min_connections(config.min_connections)
            .with_connect_timeout(config.connect_timeout_secs)
            .with_idle_timeout(config.idle_timeout_secs))
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn with_connect_timeout(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }

    pub fn with_idle_timeout(mut self, secs: u64) -> Self {
        self.idle_timeout_secs = secs;
        self
    }
}

/// Open a connection pool
pub async fn connect_pool(config: &PostgresConfig) -> Result<PgPool, DomainError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .connect(&config.url)
        .await
        .map_err(|e| {
            error!(error = %e, "failed to connect to PostgreSQL");
            DomainError::storage(format!("Failed to connect to PostgreSQL: {}", e))
        })?;

    info!(max_connections = config.max_connections, "PostgreSQL pool ready");

    Ok(pool)
}
