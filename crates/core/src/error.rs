//! Error taxonomy shared by every layer.

use thiserror::Error;

/// Result type used across the service layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Service-level error.
///
/// Every failure that can reach the HTTP edge is classified into one of these
/// variants. Lower layers keep their own error enums and convert into this one
/// at the boundary; the API maps each variant to a status code and envelope.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed or missing request fields.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Missing, malformed, invalid or expired credentials.
    #[error("{0}")]
    Authentication(String),

    /// Authenticated, but the action is not permitted.
    #[error("{0}")]
    Authorization(String),

    /// A requested entity does not exist.
    #[error("{0}")]
    NotFound(String),

    /// A unique field is already taken (e.g. email).
    #[error("{0}")]
    Conflict(String),

    /// A backing dependency (store, cache, enforcer) failed.
    ///
    /// The message is for logs only and is never sent to clients.
    #[error("dependency failure: {0}")]
    Dependency(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn authentication(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    pub fn authorization(msg: impl Into<String>) -> Self {
        Self::Authorization(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn dependency(msg: impl Into<String>) -> Self {
        Self::Dependency(msg.into())
    }

    /// Stable machine-readable kind (used in logs).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Authentication(_) => "authentication",
            Self::Authorization(_) => "authorization",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Dependency(_) => "dependency",
        }
    }
}
