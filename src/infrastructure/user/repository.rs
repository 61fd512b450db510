//! In-memory user store implementation

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::user::{UserId, UserRecord, UserStore};
use crate::domain::DomainError;

#[derive(Debug, Default)]
struct Inner {
    records: HashMap<UserId, UserRecord>,
    /// Unique index: email -> record ID
    email_index: HashMap<String, UserId>,
}

/// In-memory implementation of UserStore
///
/// Enforces the unique email index under a single write lock, so of two
/// concurrent inserts with the same email at most one succeeds.
#[derive(Debug, Default, Clone)]
pub struct InMemoryUserStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryUserStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }
}

/// Records are kept as a store returns them: persisted, without pending changes
fn stored_copy(record: &UserRecord) -> UserRecord {
    UserRecord::from_parts(record.to_parts())
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn get(&self, id: &UserId) -> Result<Option<UserRecord>, DomainError> {
        let inner = self.inner.read().await;
        Ok(inner.records.get(id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<UserRecord>, DomainError> {
        let inner = self.inner.read().await;

        Ok(inner
            .email_index
            .get(email)
            .and_then(|id| inner.records.get(id))
            .cloned())
    }

    async fn insert(&self, record: &UserRecord) -> Result<(), DomainError> {
        let mut inner = self.inner.write().await;
        let id = *record.id();

        if inner.records.contains_key(&id) {
            return Err(DomainError::conflict(format!(
                "User with ID '{}' already exists",
                id
            )));
        }

        if inner.email_index.contains_key(record.email()) {
            return Err(DomainError::conflict(format!(
                "Email '{}' already exists",
                record.email()
            )));
        }

        inner.email_index.insert(record.email().to_string(), id);
        inner.records.insert(id, stored_copy(record));

        Ok(())
    }

    async fn update(&self, record: &UserRecord, expected_version: u32) -> Result<(), DomainError> {
        let mut inner = self.inner.write().await;
        let id = *record.id();

        let (old_email, stored_version) = match inner.records.get(&id) {
            Some(stored) => (stored.email().to_string(), stored.version()),
            None => return Err(DomainError::not_found(format!("User '{}' not found", id))),
        };

        if stored_version != expected_version {
            return Err(DomainError::conflict(format!(
                "User '{}' was modified concurrently (stored version {}, expected {})",
                id, stored_version, expected_version
            )));
        }

        let new_email = record.email().to_string();

        if old_email != new_email {
            if inner.email_index.contains_key(&new_email) {
                return Err(DomainError::conflict(format!(
                    "Email '{}' already exists",
                    new_email
                )));
            }

            inner.email_index.remove(&old_email);
            inner.email_index.insert(new_email, id);
        }

        inner.records.insert(id, stored_copy(record));

        Ok(())
    }

    async fn delete(&self, id: &UserId) -> Result<bool, DomainError> {
        let mut inner = self.inner.write().await;

        if let Some(record) = inner.records.remove(id) {
            inner.email_index.remove(record.email());
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn list(&self) -> Result<Vec<UserRecord>, DomainError> {
        let inner = self.inner.read().await;

        let mut records: Vec<UserRecord> = inner.records.values().cloned().collect();
        records.sort_by_key(|r| r.created_at());

        Ok(records)
    }

    async fn count_by_email(&self, email: &str) -> Result<usize, DomainError> {
        let inner = self.inner.read().await;
        Ok(usize::from(inner.email_index.contains_key(email)))
    }
}
