//! bcrypt password hashing.
//!
//! Hashing is CPU-bound; async callers should run these on a blocking thread.

use thiserror::Error;

use keystone_core::DomainError;

/// bcrypt ignores everything past this many bytes of input.
pub const MAX_PASSWORD_BYTES: usize = 72;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PasswordError {
    #[error("bcrypt cost {0} out of range (4..=31)")]
    InvalidCost(u32),

    #[error("password must be at most {MAX_PASSWORD_BYTES} bytes")]
    TooLong,

    #[error("password hashing failed: {0}")]
    Hashing(String),
}

impl From<PasswordError> for DomainError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::TooLong => DomainError::validation(err.to_string()),
            other => DomainError::dependency(other.to_string()),
        }
    }
}

/// An encoded bcrypt hash (`$2b$...`).
///
/// `Debug` is redacted so hashes never end up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Wrap an already-encoded hash (e.g. read back from the store).
    pub fn from_encoded(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("PasswordHash(<redacted>)")
    }
}

/// Password hasher with a fixed work factor.
///
/// Holds a precomputed hash used by [`PasswordHasher::verify_dummy`] so that a
/// login for an unknown account costs the same as a wrong password.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    cost: u32,
    dummy: PasswordHash,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Result<Self, PasswordError> {
        if !(4..=31).contains(&cost) {
            return Err(PasswordError::InvalidCost(cost));
        }
        let dummy = hash_with_cost("keystone-dummy-credential", cost)?;
        Ok(Self { cost, dummy })
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Refuses input bcrypt would silently truncate.
    pub fn hash(&self, password: &str) -> Result<PasswordHash, PasswordError> {
        if password.len() > MAX_PASSWORD_BYTES {
            return Err(PasswordError::TooLong);
        }
        hash_with_cost(password, self.cost)
    }

    /// Check `password` against `hash`. A hash that fails to parse never
    /// matches, and neither does input longer than [`MAX_PASSWORD_BYTES`].
    pub fn verify(&self, password: &str, hash: &PasswordHash) -> bool {
        if password.len() > MAX_PASSWORD_BYTES {
            return self.verify_dummy(password);
        }
        match bcrypt::verify(password, hash.as_str()) {
            Ok(matched) => matched,
            Err(e) => {
                tracing::warn!(error = %e, "stored password hash is unreadable");
                false
            }
        }
    }

    /// Burn one verification worth of CPU; always returns `false`.
    pub fn verify_dummy(&self, password: &str) -> bool {
        let _ = bcrypt::verify(password, self.dummy.as_str());
        false
    }
}

fn hash_with_cost(password: &str, cost: u32) -> Result<PasswordHash, PasswordError> {
    bcrypt::hash(password, cost)
        .map(PasswordHash)
        .map_err(|e| PasswordError::Hashing(e.to_string()))
}
