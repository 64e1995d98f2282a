//! Cache-aside profile read path.
//!
//! `get_profile` consults the cache first and only falls back to the
//! credential store on a miss, then backfills the cache. Nothing invalidates
//! an entry early: a profile change elsewhere is visible only once the TTL
//! lapses. Two concurrent misses may both read the store and both write the
//! cache; the last write wins.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use keystone_auth::Profile;
use keystone_core::{DomainError, PrincipalId};

use crate::cache::Cache;
use crate::store::{CredentialStore, StoreError};

/// Default lifetime of a cached profile snapshot.
pub const DEFAULT_PROFILE_TTL: Duration = Duration::from_secs(10 * 60);

/// Cached marker for "no such principal" when negative caching is on.
const TOMBSTONE: &[u8] = b"\0absent";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProfileError {
    #[error("principal {0} not found")]
    NotFound(PrincipalId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ProfileError> for DomainError {
    fn from(err: ProfileError) -> Self {
        match err {
            ProfileError::NotFound(_) => DomainError::not_found("user not found"),
            ProfileError::Store(e) => e.into(),
        }
    }
}

/// What to do when the store reports a principal as absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NegativeCaching {
    /// Every miss re-queries the store.
    #[default]
    Disabled,
    /// Cache a tombstone for `ttl` so repeated lookups of a missing id skip
    /// the store until it expires.
    Tombstone { ttl: Duration },
}

pub fn profile_cache_key(id: PrincipalId) -> String {
    format!("profile:{id}")
}

pub struct ProfileLoader {
    store: Arc<dyn CredentialStore>,
    cache: Arc<dyn Cache>,
    ttl: Duration,
    negative: NegativeCaching,
}

impl core::fmt::Debug for ProfileLoader {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ProfileLoader")
            .field("ttl", &self.ttl)
            .field("negative", &self.negative)
            .finish_non_exhaustive()
    }
}

impl ProfileLoader {
    pub fn new(store: Arc<dyn CredentialStore>, cache: Arc<dyn Cache>, ttl: Duration) -> Self {
        Self {
            store,
            cache,
            ttl,
            negative: NegativeCaching::Disabled,
        }
    }

    pub fn with_negative_caching(mut self, negative: NegativeCaching) -> Self {
        self.negative = negative;
        self
    }

    /// Load a profile, reading the store at most once.
    pub async fn get_profile(&self, id: PrincipalId) -> Result<Profile, ProfileError> {
        let key = profile_cache_key(id);

        match self.cache.get(&key).await {
            Ok(Some(bytes)) if bytes == TOMBSTONE => {
                debug!(%id, "profile cache hit (tombstone)");
                return Err(ProfileError::NotFound(id));
            }
            Ok(Some(bytes)) => match serde_json::from_slice::<Profile>(&bytes) {
                Ok(profile) => {
                    debug!(%id, "profile cache hit");
                    return Ok(profile);
                }
                Err(e) => warn!(%id, error = %e, "undecodable profile cache entry; reloading"),
            },
            Ok(None) => debug!(%id, "profile cache miss"),
            Err(e) => warn!(%id, error = %e, "profile cache read failed; falling back to store"),
        }

        let Some(principal) = self.store.find_by_id(id).await? else {
            if let NegativeCaching::Tombstone { ttl } = self.negative {
                self.write_back(&key, TOMBSTONE.to_vec(), ttl).await;
            }
            return Err(ProfileError::NotFound(id));
        };

        let profile = principal.profile();
        match serde_json::to_vec(&profile) {
            Ok(bytes) => self.write_back(&key, bytes, self.ttl).await,
            Err(e) => warn!(%id, error = %e, "profile snapshot not serializable; skipping cache"),
        }

        Ok(profile)
    }

    async fn write_back(&self, key: &str, bytes: Vec<u8>, ttl: Duration) {
        if let Err(e) = self.cache.set(key, bytes, ttl).await {
            warn!(key, error = %e, "profile cache write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use keystone_auth::{NewPrincipal, PasswordHash, Principal};
    use keystone_core::Email;

    use crate::cache::{CacheError, InMemoryCache};
    use crate::store::InMemoryCredentialStore;

    /// Store double that counts id lookups.
    #[derive(Default)]
    struct CountingStore {
        inner: InMemoryCredentialStore,
        by_id_reads: AtomicUsize,
    }

    impl CountingStore {
        fn reads(&self) -> usize {
            self.by_id_reads.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CredentialStore for CountingStore {
        async fn create(&self, principal: NewPrincipal) -> Result<Principal, StoreError> {
            self.inner.create(principal).await
        }

        async fn find_by_email(&self, email: &Email) -> Result<Option<Principal>, StoreError> {
            self.inner.find_by_email(email).await
        }

        async fn find_by_id(&self, id: PrincipalId) -> Result<Option<Principal>, StoreError> {
            self.by_id_reads.fetch_add(1, Ordering::SeqCst);
            self.inner.find_by_id(id).await
        }
    }

    /// Cache double whose every operation fails.
    struct BrokenCache;

    #[async_trait]
    impl Cache for BrokenCache {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
            Err(CacheError::Backend("down".to_string()))
        }

        async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<(), CacheError> {
            Err(CacheError::Backend("down".to_string()))
        }
    }

    async fn seeded_store() -> (Arc<CountingStore>, PrincipalId) {
        let store = Arc::new(CountingStore::default());
        let created = store
            .create(NewPrincipal {
                name: "Ann".to_string(),
                email: Email::parse("ann@x.com").unwrap(),
                password_hash: PasswordHash::from_encoded("$2b$04$hash"),
            })
            .await
            .unwrap();
        (store, created.id)
    }

    #[tokio::test]
    async fn second_call_is_served_from_cache() {
        let (store, id) = seeded_store().await;
        let cache = Arc::new(InMemoryCache::new());
        let loader = ProfileLoader::new(store.clone(), cache.clone(), DEFAULT_PROFILE_TTL);

        let first = loader.get_profile(id).await.unwrap();
        let second = loader.get_profile(id).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.name, "Ann");
        assert_eq!(store.reads(), 1);
    }

    #[tokio::test]
    async fn expired_entry_triggers_fresh_store_read() {
        let (store, id) = seeded_store().await;
        let cache = Arc::new(InMemoryCache::new());
        let loader = ProfileLoader::new(store.clone(), cache, Duration::from_millis(100));

        loader.get_profile(id).await.unwrap();
        loader.get_profile(id).await.unwrap();
        assert_eq!(store.reads(), 1);

        tokio::time::sleep(Duration::from_millis(250)).await;
        loader.get_profile(id).await.unwrap();

        assert_eq!(store.reads(), 2);
    }

    #[tokio::test]
    async fn cache_entry_is_the_profile_snapshot() {
        let (store, id) = seeded_store().await;
        let cache = Arc::new(InMemoryCache::new());
        let loader = ProfileLoader::new(store, cache.clone(), DEFAULT_PROFILE_TTL);

        loader.get_profile(id).await.unwrap();

        let bytes = cache.get(&profile_cache_key(id)).await.unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["email"], "ann@x.com");
        assert!(json.get("password_hash").is_none());
        assert_eq!(profile_cache_key(id), format!("profile:{}", id.get()));
    }

    #[tokio::test]
    async fn missing_principal_is_not_cached_by_default() {
        let (store, _) = seeded_store().await;
        let cache = Arc::new(InMemoryCache::new());
        let loader = ProfileLoader::new(store.clone(), cache.clone(), DEFAULT_PROFILE_TTL);

        let missing = PrincipalId::new(404);
        assert_eq!(loader.get_profile(missing).await, Err(ProfileError::NotFound(missing)));
        assert_eq!(loader.get_profile(missing).await, Err(ProfileError::NotFound(missing)));

        assert_eq!(store.reads(), 2);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn tombstones_bound_repeated_misses() {
        let (store, _) = seeded_store().await;
        let cache = Arc::new(InMemoryCache::new());
        let loader = ProfileLoader::new(store.clone(), cache, DEFAULT_PROFILE_TTL).with_negative_caching(
            NegativeCaching::Tombstone {
                ttl: Duration::from_millis(100),
            },
        );

        let missing = PrincipalId::new(404);
        assert!(loader.get_profile(missing).await.is_err());
        assert!(loader.get_profile(missing).await.is_err());
        assert_eq!(store.reads(), 1);

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(loader.get_profile(missing).await.is_err());
        assert_eq!(store.reads(), 2);
    }

    #[tokio::test]
    async fn corrupt_entry_is_treated_as_miss_and_repaired() {
        let (store, id) = seeded_store().await;
        let cache = Arc::new(InMemoryCache::new());
        cache
            .set(&profile_cache_key(id), b"{not json".to_vec(), DEFAULT_PROFILE_TTL)
            .await
            .unwrap();
        let loader = ProfileLoader::new(store.clone(), cache.clone(), DEFAULT_PROFILE_TTL);

        assert_eq!(loader.get_profile(id).await.unwrap().id, id);
        assert_eq!(loader.get_profile(id).await.unwrap().id, id);
        assert_eq!(store.reads(), 1);
    }

    #[tokio::test]
    async fn cache_outage_is_not_fatal() {
        let (store, id) = seeded_store().await;
        let loader = ProfileLoader::new(store.clone(), Arc::new(BrokenCache), DEFAULT_PROFILE_TTL);

        assert_eq!(loader.get_profile(id).await.unwrap().id, id);
        assert_eq!(loader.get_profile(id).await.unwrap().id, id);
        assert_eq!(store.reads(), 2);
    }

    #[tokio::test]
    async fn not_found_maps_to_domain_not_found() {
        let err: DomainError = ProfileError::NotFound(PrincipalId::new(1)).into();
        assert!(matches!(err, DomainError::NotFound(_)));
    }
}
