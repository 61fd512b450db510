//! User validation utilities

use thiserror::Error;

use crate::domain::DomainError;

/// Errors that can occur during user validation
#[derive(Debug, Error, Clone, PartialEq)]
pub enum UserValidationError {
    #[error("Email is required")]
    EmptyEmail,

    #[error("Password is required")]
    EmptyPassword,

    #[error("Email already exists")]
    EmailTaken(String),
}

impl From<UserValidationError> for DomainError {
    fn from(err: UserValidationError) -> Self {
        DomainError::validation(err.to_string())
    }
}

/// Normalize an email for storage and comparison.
///
/// Emails are stored lowercase, so every uniqueness check compares the
/// lowercased form.
pub fn normalize_email(email: &str) -> String {
    email.to_lowercase()
}

/// Validate that an email is present
pub fn validate_email(email: &str) -> Result<(), UserValidationError> {
    if email.is_empty() {
        return Err(UserValidationError::EmptyEmail);
    }

    Ok(())
}

/// Validate that a password is present
pub fn validate_password(password: &str) -> Result<(), UserValidationError> {
    if password.is_empty() {
        return Err(UserValidationError::EmptyPassword);
    }

    Ok(())
}

/// Decide whether an email is free given the number of stored records using it
pub fn check_email_available(email: &str, existing: usize) -> Result<(), UserValidationError> {
    if existing > 0 {
        return Err(UserValidationError::EmailTaken(email.to_string()));
    }

    Ok(())
}
