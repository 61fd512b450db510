//! Password hashing utilities using Argon2

use argon2::{
    password_hash::{
        Error as PasswordHashError, PasswordHash, PasswordHasher as Argon2PasswordHasher,
        PasswordVerifier, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use std::fmt::Debug;
use tracing::error;

use crate::config::HashingConfig;
use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

/// Cost factor: number of passes over memory for every hash
pub const HASH_ROUNDS: u32 = 10;

/// Trait for password hashing operations
#[cfg_attr(test, automock)]
pub trait PasswordHasher: Send + Sync + Debug {
    /// Hash a password with a fresh random salt
    fn hash(&self, password: &str) -> Result<String, DomainError>;

    /// Verify a password against a stored hash.
    ///
    /// A mismatch is `Ok(false)`; errors are reserved for hashes that cannot
    /// be parsed or a failing backend.
    fn verify(&self, password: &str, hash: &str) -> Result<bool, DomainError>;
}

/// Argon2id password hasher with a fixed number of rounds
#[derive(Debug, Clone)]
pub struct Argon2Hasher {
    memory_kib: u32,
    parallelism: u32,
}

impl Default for Argon2Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Argon2Hasher {
    /// Create a hasher with the library's default memory and parallelism
    pub fn new() -> Self {
        Self::with_cost(Params::DEFAULT_M_COST, Params::DEFAULT_P_COST)
    }

    /// Create a hasher with explicit memory (KiB) and parallelism costs
    pub fn with_cost(memory_kib: u32, parallelism: u32) -> Self {
        Self {
            memory_kib,
            parallelism,
        }
    }

    pub fn from_config(config: &HashingConfig) -> Self {
        Self::with_cost(config.memory_kib, config.parallelism)
    }

    fn argon2(&self) -> Result<Argon2<'static>, DomainError> {
        let params = Params::new(self.memory_kib, HASH_ROUNDS, self.parallelism, None)
            .map_err(|e| {
                error!(error = %e, "invalid argon2 parameters");
                DomainError::hashing(format!("Invalid hashing parameters: {}", e))
            })?;

        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<String, DomainError> {
        let salt = SaltString::generate(&mut OsRng);

        self.argon2()?
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                DomainError::hashing(format!("Failed to hash password: {}", e))
            })
    }

    fn verify(&self, password: &str, hash: &str) -> Result<bool, DomainError> {
        let parsed_hash = PasswordHash::new(hash).map_err(|e| {
            error!(error = %e, "argon2 parse hash error");
            DomainError::hashing(format!("Stored password is not a valid hash: {}", e))
        })?;

        // Parameters and salt come from the stored hash
        match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(PasswordHashError::Password) => Ok(false),
            Err(e) => {
                error!(error = %e, "argon2 verify_password error");
                Err(DomainError::hashing(format!(
                    "Failed to verify password: {}",
                    e
                )))
            }
        }
    }
}
