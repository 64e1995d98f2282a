//! Registration and login.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, instrument};

use keystone_auth::{NewPrincipal, PasswordError, PasswordHasher, Profile, TokenError, TokenService};
use keystone_core::{DomainError, Email};

use crate::store::{CredentialStore, StoreError};

/// Uniform message for every failed login.
pub const INVALID_CREDENTIALS: &str = "invalid credentials";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccountError {
    #[error("email already registered")]
    EmailTaken,

    /// Unknown email and wrong password are deliberately indistinguishable.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("blocking task failed: {0}")]
    Task(String),
}

impl From<StoreError> for AccountError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(_) => AccountError::EmailTaken,
            other => AccountError::Store(other),
        }
    }
}

impl From<AccountError> for DomainError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::EmailTaken => DomainError::conflict("email already registered"),
            AccountError::InvalidCredentials => DomainError::authentication(INVALID_CREDENTIALS),
            AccountError::Store(e) => e.into(),
            AccountError::Password(e) => e.into(),
            AccountError::Token(e) => DomainError::dependency(e.to_string()),
            AccountError::Task(msg) => DomainError::dependency(msg),
        }
    }
}

/// Registration input, already validated at the edge.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub email: Email,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    pub token: String,
    pub expires_in: i64,
    pub profile: Profile,
}

pub struct AccountService {
    store: Arc<dyn CredentialStore>,
    hasher: Arc<PasswordHasher>,
    tokens: Arc<TokenService>,
}

impl core::fmt::Debug for AccountService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AccountService")
            .field("hasher", &self.hasher)
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}

impl AccountService {
    pub fn new(store: Arc<dyn CredentialStore>, hasher: Arc<PasswordHasher>, tokens: Arc<TokenService>) -> Self {
        Self { store, hasher, tokens }
    }

    #[instrument(skip(self, account), fields(email = %account.email))]
    pub async fn register(&self, account: NewAccount) -> Result<Profile, AccountError> {
        if self.store.find_by_email(&account.email).await?.is_some() {
            return Err(AccountError::EmailTaken);
        }

        let hasher = self.hasher.clone();
        let password = account.password;
        let password_hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AccountError::Task(e.to_string()))??;

        let principal = self
            .store
            .create(NewPrincipal {
                name: account.name,
                email: account.email,
                password_hash,
            })
            .await?;

        info!(principal_id = %principal.id, "principal registered");
        Ok(principal.profile())
    }

    /// Authenticate and issue a bearer token.
    ///
    /// An unknown email still pays for one password verification, so both
    /// failure paths look the same from outside.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, AccountError> {
        let principal = match Email::parse(email) {
            Ok(email) => self.store.find_by_email(&email).await?,
            Err(_) => None,
        };

        let hasher = self.hasher.clone();
        let password = password.to_string();
        let (principal, matched) = tokio::task::spawn_blocking(move || match principal {
            Some(p) => {
                let matched = hasher.verify(&password, &p.password_hash);
                (Some(p), matched)
            }
            None => (None, hasher.verify_dummy(&password)),
        })
        .await
        .map_err(|e| AccountError::Task(e.to_string()))?;

        let principal = match principal {
            Some(p) if matched => p,
            _ => return Err(AccountError::InvalidCredentials),
        };

        let issued = self.tokens.issue(principal.id)?;
        info!(principal_id = %principal.id, "login succeeded");

        Ok(LoginOutcome {
            expires_in: issued.expires_in(),
            token: issued.token,
            profile: principal.profile(),
        })
    }
}
