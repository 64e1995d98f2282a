//! Byte-oriented key/value cache with per-entry TTL.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use keystone_core::DomainError;

pub mod in_memory;
#[cfg(feature = "redis")]
pub mod redis;

pub use in_memory::InMemoryCache;
#[cfg(feature = "redis")]
pub use self::redis::RedisCache;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("cache backend failure: {0}")]
    Backend(String),
}

impl From<CacheError> for DomainError {
    fn from(err: CacheError) -> Self {
        DomainError::dependency(err.to_string())
    }
}

/// Cache contract consumed by the read paths.
///
/// `get` returns `Ok(None)` for an absent or expired key.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;
}

#[async_trait]
impl<C> Cache for Arc<C>
where
    C: Cache + ?Sized,
{
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        (**self).set(key, value, ttl).await
    }
}
