//! User Records
//!
//! Persistence model for user accounts:
//! - Record schema with profile fields, admin flag and post references
//! - Case-insensitive unique emails, enforced by the store
//! - Argon2 password hashing before every write that changes the password
//! - Output serialization without password or version
//! - In-memory and PostgreSQL storage backends

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;

use tracing::info;

use infrastructure::storage::StorageFactory;
use infrastructure::user::{global_registry, Argon2Hasher, UserModel};

/// Build a user model from configuration
pub async fn create_user_model(config: &AppConfig) -> anyhow::Result<UserModel> {
    let store = StorageFactory::create_user_store(&config.storage).await?;
    let hasher = Arc::new(Argon2Hasher::from_config(&config.hashing));

    info!(
        backend = %config.storage.backend,
        memory_kib = config.hashing.memory_kib,
        "User model created"
    );

    Ok(UserModel::new(store, hasher))
}

/// Build the user model and register it process-wide
pub async fn init_user_model(config: &AppConfig) -> anyhow::Result<Arc<UserModel>> {
    let model = create_user_model(config).await?;
    Ok(global_registry().init(model)?)
}
