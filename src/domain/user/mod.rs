//! User domain
//!
//! This module provides domain types and traits for user account records,
//! including the record entity with change tracking, validation and the
//! storage trait.

mod entity;
mod repository;
mod validation;

pub use entity::{PostId, UserField, UserId, UserRecord, UserRecordParts};
pub use repository::UserStore;
pub use validation::{
    check_email_available, normalize_email, validate_email, validate_password,
    UserValidationError,
};

#[cfg(test)]
pub use repository::mock::MockUserStore;
