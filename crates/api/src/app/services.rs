//! Composition root: every component is constructed here, explicitly, from
//! configuration and handed to the router as one shared value.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use keystone_auth::{PasswordHasher, PolicyEnforcer, RbacPolicy, TokenService};
use keystone_infra::{
    AccountService, AppConfig, Cache, CredentialStore, InMemoryCache, InMemoryCredentialStore,
    PostgresCredentialStore, ProfileLoader,
};

use crate::validation::RequestValidator;

/// Rules loaded when `POLICY_FILE` is not set.
pub const DEFAULT_POLICY: &str = "p, admin, /protected-resource, GET\n";

pub struct AppServices {
    pub tokens: Arc<TokenService>,
    pub accounts: AccountService,
    pub profiles: ProfileLoader,
    pub policy: Arc<dyn PolicyEnforcer>,
    pub validator: RequestValidator,
}

impl core::fmt::Debug for AppServices {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppServices")
            .field("tokens", &self.tokens)
            .field("accounts", &self.accounts)
            .finish_non_exhaustive()
    }
}

impl AppServices {
    /// Wire services over already-built backends.
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn CredentialStore>,
        cache: Arc<dyn Cache>,
        policy: Arc<dyn PolicyEnforcer>,
    ) -> anyhow::Result<Self> {
        let tokens = Arc::new(
            TokenService::new(&config.jwt_secret, config.jwt_issuer.clone(), config.token_ttl)
                .context("building token service")?,
        );
        let hasher = Arc::new(PasswordHasher::new(config.bcrypt_cost).context("building password hasher")?);

        let accounts = AccountService::new(store.clone(), hasher, tokens.clone());
        let profiles = ProfileLoader::new(store, cache, config.profile_cache_ttl)
            .with_negative_caching(config.negative_caching);

        Ok(Self {
            tokens,
            accounts,
            profiles,
            policy,
            validator: RequestValidator::english(),
        })
    }
}

/// Build production services from configuration.
///
/// Postgres and Redis are used when their URLs are set; otherwise the
/// in-memory backends stand in.
pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let store = build_store(config).await?;
    let cache = build_cache(config).await?;
    let policy = build_policy(config)?;

    AppServices::new(config, store, cache, policy)
}

async fn build_store(config: &AppConfig) -> anyhow::Result<Arc<dyn CredentialStore>> {
    match &config.database_url {
        Some(url) => {
            let store = PostgresCredentialStore::connect(url, config.db_max_connections, config.db_acquire_timeout)
                .await
                .context("connecting to postgres")?;
            info!("credential store: postgres");
            Ok(Arc::new(store))
        }
        None => {
            warn!("DATABASE_URL not set; credentials are kept in memory");
            Ok(Arc::new(InMemoryCredentialStore::new()))
        }
    }
}

#[cfg(feature = "redis")]
async fn build_cache(config: &AppConfig) -> anyhow::Result<Arc<dyn Cache>> {
    match &config.redis_url {
        Some(url) => {
            let cache = keystone_infra::cache::RedisCache::connect(
                url,
                config.redis_connect_timeout,
                config.redis_response_timeout,
            )
            .await
            .context("connecting to redis")?;
            info!("profile cache: redis");
            Ok(Arc::new(cache))
        }
        None => {
            info!("profile cache: in-memory");
            Ok(Arc::new(InMemoryCache::new()))
        }
    }
}

#[cfg(not(feature = "redis"))]
async fn build_cache(config: &AppConfig) -> anyhow::Result<Arc<dyn Cache>> {
    if config.redis_url.is_some() {
        warn!("REDIS_URL is set but the redis feature is disabled; using in-memory cache");
    }
    Ok(Arc::new(InMemoryCache::new()))
}

fn build_policy(config: &AppConfig) -> anyhow::Result<Arc<dyn PolicyEnforcer>> {
    let (source, text) = match &config.policy_file {
        Some(path) => {
            let text = std::fs::read_to_string(path).with_context(|| format!("reading policy file {path}"))?;
            (path.as_str(), text)
        }
        None => ("built-in", DEFAULT_POLICY.to_string()),
    };

    let policy = RbacPolicy::from_csv(&text).with_context(|| format!("parsing policy ({source})"))?;
    info!(source, "policy loaded");
    Ok(Arc::new(policy))
}
