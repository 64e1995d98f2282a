//! Credential store: persistence of principals.
//!
//! The service only depends on the [`CredentialStore`] contract; the storage
//! engine behind it is swappable (Postgres in production, in-memory for dev
//! and tests).

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use keystone_auth::{NewPrincipal, Principal};
use keystone_core::{DomainError, Email, PrincipalId};

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryCredentialStore;
pub use postgres::PostgresCredentialStore;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A unique field (the email) is already taken.
    #[error("duplicate principal: {0}")]
    Conflict(String),

    #[error("credential store failure: {0}")]
    Backend(String),
}

impl From<StoreError> for DomainError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => DomainError::conflict(msg),
            StoreError::Backend(msg) => DomainError::dependency(msg),
        }
    }
}

/// Persistence contract for principals.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Persist a new principal and return it with its assigned id.
    async fn create(&self, principal: NewPrincipal) -> Result<Principal, StoreError>;

    async fn find_by_email(&self, email: &Email) -> Result<Option<Principal>, StoreError>;

    async fn find_by_id(&self, id: PrincipalId) -> Result<Option<Principal>, StoreError>;
}

#[async_trait]
impl<S> CredentialStore for Arc<S>
where
    S: CredentialStore + ?Sized,
{
    async fn create(&self, principal: NewPrincipal) -> Result<Principal, StoreError> {
        (**self).create(principal).await
    }

    async fn find_by_email(&self, email: &Email) -> Result<Option<Principal>, StoreError> {
        (**self).find_by_email(email).await
    }

    async fn find_by_id(&self, id: PrincipalId) -> Result<Option<Principal>, StoreError> {
        (**self).find_by_id(id).await
    }
}
