//! Redis-backed cache (optional, feature `redis`).
//!
//! One multiplexed connection is opened at startup and cloned per call; the
//! connect and response timeouts set there bound every cache operation.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;

use super::{Cache, CacheError};

#[derive(Clone)]
pub struct RedisCache {
    conn: MultiplexedConnection,
}

impl core::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RedisCache").finish_non_exhaustive()
    }
}

impl RedisCache {
    pub async fn connect(
        redis_url: impl AsRef<str>,
        connect_timeout: Duration,
        response_timeout: Duration,
    ) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| CacheError::Backend(format!("open: {e}")))?;

        let conn = client
            .get_multiplexed_async_connection_with_timeouts(response_timeout, connect_timeout)
            .await
            .map_err(|e| CacheError::Backend(format!("connect: {e}")))?;

        Ok(Self { conn })
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut conn = self.conn.clone();
        redis::cmd("GET")
            .arg(key)
            .query_async::<_, Option<Vec<u8>>>(&mut conn)
            .await
            .map_err(|e| CacheError::Backend(format!("GET {key}: {e}")))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);

        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(millis)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| CacheError::Backend(format!("SET {key}: {e}")))
    }
}
