//! User infrastructure module
//!
//! Argon2 password hashing, the in-memory and PostgreSQL user stores, the
//! `UserModel` that ties them together and its process-wide registry.

mod password;
mod postgres_repository;
mod registry;
mod repository;
mod service;

pub use password::{Argon2Hasher, PasswordHasher, HASH_ROUNDS};
pub use postgres_repository::PostgresUserStore;
pub use registry::{global_registry, ModelRegistry};
pub use repository::InMemoryUserStore;
pub use service::UserModel;

#[cfg(test)]
pub use password::MockPasswordHasher;
