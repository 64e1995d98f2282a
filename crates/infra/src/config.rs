//! Process configuration, read once from the environment at startup.
//!
//! Every value has a development default except the optional backends
//! (`DATABASE_URL`, `REDIS_URL`, `POLICY_FILE`), whose absence selects the
//! in-memory implementations and the built-in policy.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::profile::{DEFAULT_PROFILE_TTL, NegativeCaching};

pub const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}' ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub token_ttl: Duration,
    pub profile_cache_ttl: Duration,
    pub negative_caching: NegativeCaching,
    pub bcrypt_cost: u32,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_acquire_timeout: Duration,
    pub redis_url: Option<String>,
    pub redis_connect_timeout: Duration,
    pub redis_response_timeout: Duration,
    pub policy_file: Option<String>,
    pub shutdown_grace: Duration,
}

impl core::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("jwt_secret", &"<redacted>")
            .field("jwt_issuer", &self.jwt_issuer)
            .field("token_ttl", &self.token_ttl)
            .field("profile_cache_ttl", &self.profile_cache_ttl)
            .field("negative_caching", &self.negative_caching)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("database_url", &self.database_url.as_ref().map(|_| "<set>"))
            .field("db_max_connections", &self.db_max_connections)
            .field("db_acquire_timeout", &self.db_acquire_timeout)
            .field("redis_url", &self.redis_url.as_ref().map(|_| "<set>"))
            .field("redis_connect_timeout", &self.redis_connect_timeout)
            .field("redis_response_timeout", &self.redis_response_timeout)
            .field("policy_file", &self.policy_file)
            .field("shutdown_grace", &self.shutdown_grace)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            jwt_issuer: "keystone".to_string(),
            token_ttl: Duration::from_secs(24 * 60 * 60),
            profile_cache_ttl: DEFAULT_PROFILE_TTL,
            negative_caching: NegativeCaching::Disabled,
            bcrypt_cost: 12,
            database_url: None,
            db_max_connections: 10,
            db_acquire_timeout: Duration::from_secs(5),
            redis_url: None,
            redis_connect_timeout: Duration::from_millis(2_000),
            redis_response_timeout: Duration::from_millis(500),
            policy_file: None,
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jwt_secret = match get("JWT_SECRET") {
            Some(secret) => secret,
            None => {
                tracing::warn!("JWT_SECRET not set; using insecure dev default");
                defaults.jwt_secret
            }
        };

        let negative_caching = match parse_opt::<u64>(&get, "PROFILE_TOMBSTONE_TTL_SECS")? {
            None | Some(0) => NegativeCaching::Disabled,
            Some(secs) => NegativeCaching::Tombstone {
                ttl: Duration::from_secs(secs),
            },
        };

        let bcrypt_cost = parse_opt::<u32>(&get, "BCRYPT_COST")?.unwrap_or(defaults.bcrypt_cost);
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(invalid("BCRYPT_COST", bcrypt_cost.to_string(), "must be within 4..=31"));
        }

        Ok(Self {
            bind_addr: parse_opt(&get, "BIND_ADDR")?.unwrap_or(defaults.bind_addr),
            jwt_secret,
            jwt_issuer: get("JWT_ISSUER").unwrap_or(defaults.jwt_issuer),
            token_ttl: secs(&get, "TOKEN_TTL_SECS")?.unwrap_or(defaults.token_ttl),
            profile_cache_ttl: secs(&get, "PROFILE_CACHE_TTL_SECS")?.unwrap_or(defaults.profile_cache_ttl),
            negative_caching,
            bcrypt_cost,
            database_url: get("DATABASE_URL"),
            db_max_connections: parse_opt(&get, "DB_MAX_CONNECTIONS")?.unwrap_or(defaults.db_max_connections),
            db_acquire_timeout: secs(&get, "DB_ACQUIRE_TIMEOUT_SECS")?.unwrap_or(defaults.db_acquire_timeout),
            redis_url: get("REDIS_URL"),
            redis_connect_timeout: millis(&get, "REDIS_CONNECT_TIMEOUT_MS")?
                .unwrap_or(defaults.redis_connect_timeout),
            redis_response_timeout: millis(&get, "REDIS_RESPONSE_TIMEOUT_MS")?
                .unwrap_or(defaults.redis_response_timeout),
            policy_file: get("POLICY_FILE"),
            shutdown_grace: secs(&get, "SHUTDOWN_GRACE_SECS")?.unwrap_or(defaults.shutdown_grace),
        })
    }
}

fn invalid(key: &'static str, value: impl Into<String>, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.into(),
        reason: reason.into(),
    }
}

fn parse_opt<T>(get: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: core::fmt::Display,
{
    get(key)
        .map(|raw| raw.trim().parse::<T>().map_err(|e| invalid(key, raw.clone(), e.to_string())))
        .transpose()
}

fn secs(get: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<Option<Duration>, ConfigError> {
    nonzero(key, parse_opt::<u64>(get, key)?).map(|v| v.map(Duration::from_secs))
}

fn millis(get: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<Option<Duration>, ConfigError> {
    nonzero(key, parse_opt::<u64>(get, key)?).map(|v| v.map(Duration::from_millis))
}

fn nonzero(key: &'static str, value: Option<u64>) -> Result<Option<u64>, ConfigError> {
    match value {
        Some(0) => Err(invalid(key, "0", "must be greater than zero")),
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let cfg = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.jwt_secret, DEV_JWT_SECRET);
        assert_eq!(cfg.profile_cache_ttl, Duration::from_secs(600));
    }

    #[test]
    fn reads_typed_values() {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("BIND_ADDR", "127.0.0.1:9000"),
            ("JWT_SECRET", "prod-secret"),
            ("TOKEN_TTL_SECS", "60"),
            ("PROFILE_TOMBSTONE_TTL_SECS", "5"),
            ("BCRYPT_COST", "10"),
            ("DATABASE_URL", "postgres://localhost/keystone"),
            ("REDIS_RESPONSE_TIMEOUT_MS", "250"),
        ]))
        .unwrap();

        assert_eq!(cfg.bind_addr, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(cfg.jwt_secret, "prod-secret");
        assert_eq!(cfg.token_ttl, Duration::from_secs(60));
        assert_eq!(
            cfg.negative_caching,
            NegativeCaching::Tombstone { ttl: Duration::from_secs(5) }
        );
        assert_eq!(cfg.bcrypt_cost, 10);
        assert_eq!(cfg.database_url.as_deref(), Some("postgres://localhost/keystone"));
        assert_eq!(cfg.redis_response_timeout, Duration::from_millis(250));
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let cfg = AppConfig::from_lookup(lookup(&[("DATABASE_URL", "  "), ("JWT_ISSUER", "")])).unwrap();
        assert_eq!(cfg.database_url, None);
        assert_eq!(cfg.jwt_issuer, "keystone");
    }

    #[test]
    fn rejects_malformed_values() {
        let err = AppConfig::from_lookup(lookup(&[("TOKEN_TTL_SECS", "soon")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "TOKEN_TTL_SECS", .. }));

        let err = AppConfig::from_lookup(lookup(&[("TOKEN_TTL_SECS", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "TOKEN_TTL_SECS", .. }));

        let err = AppConfig::from_lookup(lookup(&[("BCRYPT_COST", "40")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "BCRYPT_COST", .. }));
    }

    #[test]
    fn debug_redacts_secrets() {
        let cfg = AppConfig::from_lookup(lookup(&[("JWT_SECRET", "hunter2")])).unwrap();
        assert!(!format!("{cfg:?}").contains("hunter2"));
    }
}
