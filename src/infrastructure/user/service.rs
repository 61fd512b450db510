//! User model: validation, the pre-persist hashing step and password comparison

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::domain::user::{
    check_email_available, normalize_email, validate_email, validate_password, UserField,
    UserId, UserRecord, UserStore,
};
use crate::domain::DomainError;

use super::password::PasswordHasher;

/// Handle for reading and writing user records.
///
/// Every write goes through [`UserModel::save`], which validates the record,
/// runs [`UserModel::prepare_for_persist`] and only then hands the record to
/// the store.
#[derive(Debug, Clone)]
pub struct UserModel {
    store: Arc<dyn UserStore>,
    hasher: Arc<dyn PasswordHasher>,
}

impl UserModel {
    /// Create a new user model
    pub fn new(store: Arc<dyn UserStore>, hasher: Arc<dyn PasswordHasher>) -> Self {
        Self { store, hasher }
    }

    /// Construct and save a new record
    pub async fn create(
        &self,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<UserRecord, DomainError> {
        let mut record = UserRecord::new(email, password);
        self.save(&mut record).await?;
        Ok(record)
    }

    /// Check required fields and email uniqueness.
    ///
    /// The uniqueness count only runs for new records or a changed email. It
    /// is not atomic with the following write; the store's unique index is
    /// what finally rejects a duplicate.
    pub async fn validate(&self, record: &UserRecord) -> Result<(), DomainError> {
        validate_email(record.email())?;
        validate_password(record.password())?;

        if record.is_new() || record.is_modified(UserField::Email) {
            let existing = self.store.count_by_email(record.email()).await?;

            if let Err(e) = check_email_available(record.email(), existing) {
                warn!(email = %record.email(), "email already in use");
                return Err(e.into());
            }
        }

        Ok(())
    }

    /// Transform a record right before it is written.
    ///
    /// An unchanged password passes through untouched. A changed one is
    /// replaced by its salted hash; a hashing failure aborts with the record
    /// dropped, so no plaintext can reach the store.
    pub async fn prepare_for_persist(&self, record: UserRecord) -> Result<UserRecord, DomainError> {
        if !record.is_modified(UserField::Password) {
            return Ok(record);
        }

        let hasher = Arc::clone(&self.hasher);
        let plaintext = record.password().to_string();

        let hash = tokio::task::spawn_blocking(move || hasher.hash(&plaintext))
            .await
            .map_err(|e| DomainError::internal(format!("Password hashing task failed: {}", e)))??;

        debug!(user_id = %record.id(), "password hashed");

        let mut record = record;
        record.replace_password_hash(hash);
        Ok(record)
    }

    /// Persist a record.
    ///
    /// A loaded record without changes is left alone. On success the record
    /// holds the stored state (hashed password, new timestamps and version)
    /// and has no pending changes; on failure it is unchanged.
    pub async fn save(&self, record: &mut UserRecord) -> Result<(), DomainError> {
        if !record.has_changes() {
            debug!(user_id = %record.id(), "no changes to save");
            return Ok(());
        }

        self.validate(record).await?;

        let mut prepared = self.prepare_for_persist(record.clone()).await?;
        prepared.stamp(Utc::now());

        if prepared.is_new() {
            self.store.insert(&prepared).await?;
            info!(user_id = %prepared.id(), "user created");
        } else {
            let expected_version = prepared.version();
            prepared.bump_version();
            self.store.update(&prepared, expected_version).await?;
            info!(
                user_id = %prepared.id(),
                fields = ?prepared.modified_fields(),
                "user updated"
            );
        }

        prepared.mark_persisted();
        *record = prepared;

        Ok(())
    }

    /// Check a plaintext candidate against the stored hash.
    ///
    /// A mismatch is `Ok(false)`, and so is any comparison while a new
    /// password is still unsaved: there is no hash to match yet. Errors are
    /// reserved for a corrupt stored hash or a failing backend.
    pub async fn compare_password(
        &self,
        record: &UserRecord,
        candidate: &str,
    ) -> Result<bool, DomainError> {
        if record.is_modified(UserField::Password) {
            debug!(user_id = %record.id(), "password not saved yet, no match");
            return Ok(false);
        }

        let hasher = Arc::clone(&self.hasher);
        let candidate = candidate.to_string();
        let hash = record.password().to_string();

        let matches = tokio::task::spawn_blocking(move || hasher.verify(&candidate, &hash))
            .await
            .map_err(|e| {
                DomainError::internal(format!("Password verification task failed: {}", e))
            })??;

        debug!(user_id = %record.id(), matches, "password compared");

        Ok(matches)
    }

    /// Get a record by ID
    pub async fn find_by_id(&self, id: &UserId) -> Result<Option<UserRecord>, DomainError> {
        self.store.get(id).await
    }

    /// Get a record by email, compared in lowercase
    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, DomainError> {
        self.store.get_by_email(&normalize_email(email)).await
    }

    /// List all records
    pub async fn list(&self) -> Result<Vec<UserRecord>, DomainError> {
        self.store.list().await
    }

    /// Delete a record. Referenced posts are left alone.
    pub async fn delete(&self, id: &UserId) -> Result<bool, DomainError> {
        let deleted = self.store.delete(id).await?;

        if deleted {
            info!(user_id = %id, "user deleted");
        }

        Ok(deleted)
    }

    /// Output representation of a record, without password or version
    pub fn to_output(&self, record: &UserRecord) -> Result<serde_json::Value, DomainError> {
        serde_json::to_value(record)
            .map_err(|e| DomainError::internal(format!("Failed to serialize user: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::user::{MockUserStore, UserRecordParts};
    use crate::infrastructure::user::password::{Argon2Hasher, MockPasswordHasher};
    use crate::infrastructure::user::repository::InMemoryUserStore;

    fn test_hasher() -> Arc<Argon2Hasher> {
        Arc::new(Argon2Hasher::with_cost(64, 1))
    }

    fn create_model() -> UserModel {
        UserModel::new(Arc::new(InMemoryUserStore::new()), test_hasher())
    }

    fn model_with_store(store: Arc<InMemoryUserStore>) -> UserModel {
        UserModel::new(store, test_hasher())
    }

    #[tokio::test]
    async fn test_save_then_compare_password() {
        let model = create_model();
        let mut record = UserRecord::new("u@test.com", "secret1");

        model.save(&mut record).await.unwrap();

        assert!(model.compare_password(&record, "secret1").await.unwrap());
        assert!(!model.compare_password(&record, "wrong").await.unwrap());
    }

    #[tokio::test]
    async fn test_saved_password_is_hashed() {
        let store = Arc::new(InMemoryUserStore::new());
        let model = model_with_store(store.clone());

        let record = model.create("u@test.com", "secret1").await.unwrap();

        assert_ne!(record.password(), "secret1");
        assert!(!record.is_modified(UserField::Password));

        let stored = store.get(record.id()).await.unwrap().unwrap();
        assert_ne!(stored.password(), "secret1");
        assert_eq!(stored.password(), record.password());
    }

    #[tokio::test]
    async fn test_update_without_password_change_keeps_hash() {
        let store = Arc::new(InMemoryUserStore::new());
        let model = model_with_store(store.clone());

        let record = model.create("u@test.com", "secret1").await.unwrap();
        let hash_before = store.get(record.id()).await.unwrap().unwrap().password().to_string();

        let mut loaded = model.find_by_id(record.id()).await.unwrap().unwrap();
        loaded.set_name(Some("Taro".to_string()));
        model.save(&mut loaded).await.unwrap();

        let stored = store.get(record.id()).await.unwrap().unwrap();
        assert_eq!(stored.name(), Some("Taro"));
        assert_eq!(stored.password(), hash_before);
        assert!(model.compare_password(&stored, "secret1").await.unwrap());
    }

    #[tokio::test]
    async fn test_password_hashed_at_most_once() {
        let mut hasher = MockPasswordHasher::new();
        hasher
            .expect_hash()
            .times(1)
            .returning(|password| Ok(format!("hashed:{}", password)));

        let model = UserModel::new(Arc::new(InMemoryUserStore::new()), Arc::new(hasher));
        let mut record = UserRecord::new("u@test.com", "secret1");

        model.save(&mut record).await.unwrap();
        assert_eq!(record.password(), "hashed:secret1");

        record.set_admin(true);
        model.save(&mut record).await.unwrap();
        model.save(&mut record).await.unwrap();

        assert_eq!(record.password(), "hashed:secret1");
    }

    #[tokio::test]
    async fn test_changed_password_is_rehashed() {
        let model = create_model();
        let mut record = model.create("u@test.com", "secret1").await.unwrap();
        let first_hash = record.password().to_string();

        record.set_password("secret2");
        model.save(&mut record).await.unwrap();

        assert_ne!(record.password(), first_hash);
        assert!(model.compare_password(&record, "secret2").await.unwrap());
        assert!(!model.compare_password(&record, "secret1").await.unwrap());
    }

    #[tokio::test]
    async fn test_save_without_changes_is_noop() {
        let model = create_model();
        let record = model.create("u@test.com", "secret1").await.unwrap();

        let mut loaded = model.find_by_id(record.id()).await.unwrap().unwrap();
        let updated_at = loaded.updated_at();

        model.save(&mut loaded).await.unwrap();

        assert_eq!(loaded.version(), 0);
        assert_eq!(loaded.updated_at(), updated_at);
    }

    #[tokio::test]
    async fn test_update_bumps_version_and_timestamp() {
        let model = create_model();
        let mut record = model.create("u@test.com", "secret1").await.unwrap();
        let created_at = record.created_at();
        let first_updated = record.updated_at();

        record.set_birth_year(Some(1990));
        model.save(&mut record).await.unwrap();

        assert_eq!(record.version(), 1);
        assert_eq!(record.created_at(), created_at);
        assert!(record.updated_at() >= first_updated);
    }

    #[tokio::test]
    async fn test_email_uniqueness_is_case_insensitive() {
        let model = create_model();
        model.create("a@x.com", "secret1").await.unwrap();

        let candidate = UserRecord::new("A@X.com", "secret2");
        let result = model.validate(&candidate).await;

        assert!(result.unwrap_err().is_validation());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected_before_persistence() {
        let store = Arc::new(InMemoryUserStore::new());
        let model = model_with_store(store.clone());
        model.create("a@x.com", "secret1").await.unwrap();

        let result = model.create("A@X.COM", "secret2").await;

        assert!(result.unwrap_err().is_validation());
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_existing_record_does_not_collide_with_itself() {
        let model = create_model();
        let mut record = model.create("a@x.com", "secret1").await.unwrap();

        record.set_gender(Some("female".to_string()));

        assert!(model.validate(&record).await.is_ok());
        assert!(model.save(&mut record).await.is_ok());
    }

    #[tokio::test]
    async fn test_changing_email_to_taken_one_fails() {
        let model = create_model();
        model.create("a@x.com", "secret1").await.unwrap();
        let mut other = model.create("b@x.com", "secret1").await.unwrap();

        other.set_email("A@x.com");
        let result = model.save(&mut other).await;

        assert!(result.unwrap_err().is_validation());
        assert!(other.is_modified(UserField::Email));
    }

    #[tokio::test]
    async fn test_required_fields() {
        let model = create_model();

        let missing_email = model.create("", "secret1").await;
        assert!(missing_email.unwrap_err().is_validation());

        let missing_password = model.create("u@test.com", "").await;
        assert!(missing_password.unwrap_err().is_validation());
    }

    #[tokio::test]
    async fn test_hashing_failure_aborts_save() {
        let mut hasher = MockPasswordHasher::new();
        hasher
            .expect_hash()
            .returning(|_| Err(DomainError::hashing("backend unavailable")));

        let store = Arc::new(InMemoryUserStore::new());
        let model = UserModel::new(store.clone(), Arc::new(hasher));
        let mut record = UserRecord::new("u@test.com", "secret1");

        let result = model.save(&mut record).await;

        assert!(matches!(result, Err(DomainError::Hashing { .. })));
        assert!(store.list().await.unwrap().is_empty());
        assert!(record.is_new());
        assert_eq!(record.password(), "secret1");
        assert!(record.is_modified(UserField::Password));
    }

    #[tokio::test]
    async fn test_storage_failure_propagates() {
        let store = Arc::new(MockUserStore::new());
        store.set_should_fail(true).await;

        let model = UserModel::new(store, test_hasher());
        let mut record = UserRecord::new("u@test.com", "secret1");

        let result = model.save(&mut record).await;

        assert!(matches!(result, Err(DomainError::Storage { .. })));
        assert!(record.is_new());
    }

    #[tokio::test]
    async fn test_concurrent_creations_with_same_email() {
        let model = create_model();
        let mut first = UserRecord::new("race@x.com", "secret1");
        let mut second = UserRecord::new("RACE@x.com", "secret2");

        let (a, b) = tokio::join!(model.save(&mut first), model.save(&mut second));

        let successes = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(successes, 1);
        assert_eq!(model.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_store_constraint_catches_what_validation_missed() {
        let store = Arc::new(InMemoryUserStore::new());
        let model = model_with_store(store.clone());
        let mut first = UserRecord::new("race@x.com", "secret1");
        let second = UserRecord::new("race@x.com", "secret2");

        // Both pass the count check before either is persisted
        model.validate(&first).await.unwrap();
        model.validate(&second).await.unwrap();

        model.save(&mut first).await.unwrap();

        let prepared = model.prepare_for_persist(second).await.unwrap();
        let result = store.insert(&prepared).await;

        assert!(result.unwrap_err().is_conflict());
    }

    #[tokio::test]
    async fn test_concurrent_updates_conflict_on_version() {
        let model = create_model();
        let record = model.create("u@test.com", "secret1").await.unwrap();

        let mut copy_a = model.find_by_id(record.id()).await.unwrap().unwrap();
        let mut copy_b = model.find_by_id(record.id()).await.unwrap().unwrap();

        copy_a.set_name(Some("A".to_string()));
        copy_b.set_name(Some("B".to_string()));

        model.save(&mut copy_a).await.unwrap();
        let result = model.save(&mut copy_b).await;

        assert!(result.unwrap_err().is_conflict());
    }

    #[tokio::test]
    async fn test_prepare_for_persist_skips_unchanged_password() {
        let model = create_model();
        let record = model.create("u@test.com", "secret1").await.unwrap();
        let hash = record.password().to_string();

        let prepared = model.prepare_for_persist(record).await.unwrap();

        assert_eq!(prepared.password(), hash);
    }

    #[tokio::test]
    async fn test_compare_unsaved_password_never_matches() {
        let model = create_model();
        let record = UserRecord::new("u@test.com", "secret1");

        assert!(!model.compare_password(&record, "wrong").await.unwrap());
        assert!(!model.compare_password(&record, "secret1").await.unwrap());
    }

    #[tokio::test]
    async fn test_loaded_record_compares_and_resaves() {
        let model = create_model();
        model.create("u@test.com", "secret1").await.unwrap();

        let mut loaded = model.find_by_email("u@test.com").await.unwrap().unwrap();

        assert!(!loaded.is_new());
        assert!(!loaded.has_changes());
        assert!(model.compare_password(&loaded, "secret1").await.unwrap());
        assert!(!model.compare_password(&loaded, "wrong").await.unwrap());

        loaded.set_place_city(Some("Osaka".to_string()));
        model.save(&mut loaded).await.unwrap();

        let reloaded = model.find_by_email("u@test.com").await.unwrap().unwrap();
        assert_eq!(reloaded.place_city(), Some("Osaka"));
        assert_eq!(reloaded.version(), 1);
        assert!(model.compare_password(&reloaded, "secret1").await.unwrap());
    }

    #[tokio::test]
    async fn test_email_changed_and_reverted_saves() {
        let model = create_model();
        let mut record = model.create("a@x.com", "secret1").await.unwrap();

        record.set_email("b@x.com");
        record.set_email("a@x.com");
        record.set_name(Some("Taro".to_string()));

        assert!(!record.is_modified(UserField::Email));
        model.save(&mut record).await.unwrap();
        assert_eq!(record.email(), "a@x.com");
    }

    #[tokio::test]
    async fn test_password_reverted_to_stored_hash_is_not_rehashed() {
        let model = create_model();
        let mut record = model.create("u@test.com", "secret1").await.unwrap();
        let stored_hash = record.password().to_string();

        record.set_password("tmp");
        record.set_password(stored_hash.clone());
        record.set_name(Some("Taro".to_string()));
        model.save(&mut record).await.unwrap();

        assert_eq!(record.password(), stored_hash);
        assert!(model.compare_password(&record, "secret1").await.unwrap());
    }

    #[tokio::test]
    async fn test_compare_with_corrupt_hash_is_error() {
        let model = create_model();
        let now = Utc::now();
        let record = UserRecord::from_parts(UserRecordParts {
            id: UserId::new(),
            name: None,
            birth_year: None,
            gender: None,
            place_state: None,
            place_city: None,
            is_admin: false,
            email: "u@test.com".to_string(),
            password: "not-a-hash".to_string(),
            posts: vec![],
            created_at: now,
            updated_at: now,
            version: 0,
        });

        let result = model.compare_password(&record, "anything").await;
        assert!(matches!(result, Err(DomainError::Hashing { .. })));
    }

    #[tokio::test]
    async fn test_output_never_contains_password() {
        let model = create_model();
        let record = model.create("u@test.com", "secret1").await.unwrap();

        let output = model.to_output(&record).unwrap();

        assert!(output.get("password").is_none());
        assert!(output.get("version").is_none());
        assert!(!output.to_string().contains(record.password()));
        assert_eq!(output["email"], "u@test.com");
    }

    #[tokio::test]
    async fn test_find_by_email_lowercases_query() {
        let model = create_model();
        let record = model.create("u@test.com", "secret1").await.unwrap();

        let found = model.find_by_email("U@Test.com").await.unwrap();
        assert_eq!(found.unwrap().id(), record.id());
    }

    #[tokio::test]
    async fn test_delete() {
        let model = create_model();
        let record = model.create("u@test.com", "secret1").await.unwrap();

        assert!(model.delete(record.id()).await.unwrap());
        assert!(!model.delete(record.id()).await.unwrap());
        assert!(model.find_by_id(record.id()).await.unwrap().is_none());

        // Email is free again
        assert!(model.create("u@test.com", "secret2").await.is_ok());
    }
}
