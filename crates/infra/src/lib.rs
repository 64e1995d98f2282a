//! Infrastructure layer: credential store, cache, read paths, configuration.

pub mod accounts;
pub mod cache;
pub mod config;
pub mod profile;
pub mod store;

pub use accounts::{AccountError, AccountService, LoginOutcome, NewAccount};
pub use cache::{Cache, CacheError, InMemoryCache};
pub use config::{AppConfig, ConfigError};
pub use profile::{NegativeCaching, ProfileError, ProfileLoader};
pub use store::{CredentialStore, InMemoryCredentialStore, PostgresCredentialStore, StoreError};
