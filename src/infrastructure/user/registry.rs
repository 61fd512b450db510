//! Process-wide registration of the user model

use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::domain::DomainError;

use super::service::UserModel;

static GLOBAL_REGISTRY: ModelRegistry = ModelRegistry::new();

/// The registry shared by the whole process
pub fn global_registry() -> &'static ModelRegistry {
    &GLOBAL_REGISTRY
}

/// Holds the single `UserModel` once it has been initialized.
///
/// Initialization happens exactly once; later lookups get the same handle.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    user_model: OnceCell<Arc<UserModel>>,
}

impl ModelRegistry {
    pub const fn new() -> Self {
        Self {
            user_model: OnceCell::new(),
        }
    }

    /// Register the user model. A second call is a configuration error.
    pub fn init(&self, model: UserModel) -> Result<Arc<UserModel>, DomainError> {
        let model = Arc::new(model);

        self.user_model
            .set(Arc::clone(&model))
            .map_err(|_| DomainError::configuration("User model is already initialized"))?;

        Ok(model)
    }

    /// Get the registered user model
    pub fn get(&self) -> Result<Arc<UserModel>, DomainError> {
        self.user_model
            .get()
            .cloned()
            .ok_or_else(|| DomainError::configuration("User model is not initialized"))
    }
}
