use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use keystone_auth::{NewPrincipal, Principal};
use keystone_core::{Email, PrincipalId};

use super::{CredentialStore, StoreError};

#[derive(Debug, Default)]
struct Inner {
    by_id: HashMap<PrincipalId, Principal>,
    last_id: u64,
}

/// In-memory credential store for tests/dev.
///
/// Ids are assigned sequentially starting at 1.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    inner: RwLock<Inner>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|inner| inner.by_id.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> StoreError {
    StoreError::Backend("in-memory store lock poisoned".to_string())
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn create(&self, principal: NewPrincipal) -> Result<Principal, StoreError> {
        let mut inner = self.inner.write().map_err(|_| poisoned())?;

        if inner.by_id.values().any(|p| p.email == principal.email) {
            return Err(StoreError::Conflict(principal.email.to_string()));
        }

        inner.last_id += 1;
        let created = Principal {
            id: PrincipalId::new(inner.last_id),
            name: principal.name,
            email: principal.email,
            password_hash: principal.password_hash,
            created_at: Utc::now(),
        };
        inner.by_id.insert(created.id, created.clone());

        Ok(created)
    }

    async fn find_by_email(&self, email: &Email) -> Result<Option<Principal>, StoreError> {
        let inner = self.inner.read().map_err(|_| poisoned())?;
        Ok(inner.by_id.values().find(|p| &p.email == email).cloned())
    }

    async fn find_by_id(&self, id: PrincipalId) -> Result<Option<Principal>, StoreError> {
        let inner = self.inner.read().map_err(|_| poisoned())?;
        Ok(inner.by_id.get(&id).cloned())
    }
}
