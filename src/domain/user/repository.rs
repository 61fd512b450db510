//! User store trait

use async_trait::async_trait;
use std::fmt::Debug;

use super::entity::{UserId, UserRecord};
use crate::domain::DomainError;

/// Storage collaborator for user records.
///
/// Implementations must enforce email uniqueness themselves: the
/// validation-layer count is best-effort and two concurrent creations can both
/// pass it. A violated constraint is reported as [`DomainError::Conflict`].
#[async_trait]
pub trait UserStore: Send + Sync + Debug {
    /// Get a record by its ID
    async fn get(&self, id: &UserId) -> Result<Option<UserRecord>, DomainError>;

    /// Get a record by its exact (already lowercased) email
    async fn get_by_email(&self, email: &str) -> Result<Option<UserRecord>, DomainError>;

    /// Insert a new record
    async fn insert(&self, record: &UserRecord) -> Result<(), DomainError>;

    /// Replace a stored record, provided the stored version still equals
    /// `expected_version`. The record carries its new version.
    async fn update(&self, record: &UserRecord, expected_version: u32) -> Result<(), DomainError>;

    /// Delete a record
    async fn delete(&self, id: &UserId) -> Result<bool, DomainError>;

    /// List all records, oldest first
    async fn list(&self) -> Result<Vec<UserRecord>, DomainError>;

    /// Count records whose email equals `email`
    async fn count_by_email(&self, email: &str) -> Result<usize, DomainError>;

    /// Check if a record exists
    async fn exists(&self, id: &UserId) -> Result<bool, DomainError> {
        Ok(self.get(id).await?.is_some())
    }
}
