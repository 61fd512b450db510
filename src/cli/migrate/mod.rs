//! Migrate command - applies storage migrations

use tracing::info;

use crate::config::AppConfig;
use crate::infrastructure::storage::StorageFactory;

/// Apply pending migrations for the configured backend
pub async fn run(config: &AppConfig) -> anyhow::Result<()> {
    let applied = StorageFactory::migrate(&config.storage).await?;

    info!(backend = %config.storage.backend, applied, "Migrations complete");
    println!("Applied {} migration(s)", applied);

    Ok(())
}
