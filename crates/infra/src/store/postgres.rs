//! Postgres-backed credential store.
//!
//! Expects a `users` table (schema management is out of scope here):
//!
//! ```sql
//! CREATE TABLE users (
//!     id            BIGSERIAL PRIMARY KEY,
//!     name          TEXT        NOT NULL,
//!     email         TEXT        NOT NULL UNIQUE,
//!     password_hash TEXT        NOT NULL,
//!     created_at    TIMESTAMPTZ NOT NULL DEFAULT now()
//! );
//! ```
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Anything else | any | `Backend` |

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::instrument;

use keystone_auth::{NewPrincipal, PasswordHash, Principal};
use keystone_core::{Email, PrincipalId};

use super::{CredentialStore, StoreError};

/// Credential store over a shared SQLx connection pool.
///
/// The pool is `Send + Sync`; acquire timeouts are configured once at
/// construction and apply to every query.
#[derive(Debug, Clone)]
pub struct PostgresCredentialStore {
    pool: Arc<PgPool>,
}

impl PostgresCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    /// Open a pool against `database_url`.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;

        Ok(Self::new(pool))
    }
}

#[async_trait]
impl CredentialStore for PostgresCredentialStore {
    #[instrument(skip(self, principal), fields(email = %principal.email))]
    async fn create(&self, principal: NewPrincipal) -> Result<Principal, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO users (name, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, name, email, password_hash, created_at
            "#,
        )
        .bind(&principal.name)
        .bind(principal.email.as_str())
        .bind(principal.password_hash.as_str())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("create", e))?;

        principal_from_row(&row)
    }

    #[instrument(skip(self), fields(email = %email))]
    async fn find_by_email(&self, email: &Email) -> Result<Option<Principal>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, email, password_hash, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_by_email", e))?;

        row.as_ref().map(principal_from_row).transpose()
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: PrincipalId) -> Result<Option<Principal>, StoreError> {
        let Ok(id) = i64::try_from(id.get()) else {
            return Ok(None);
        };

        let row = sqlx::query(
            r#"
            SELECT id, name, email, password_hash, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_by_id", e))?;

        row.as_ref().map(principal_from_row).transpose()
    }
}

fn principal_from_row(row: &PgRow) -> Result<Principal, StoreError> {
    let id: i64 = row.try_get("id").map_err(|e| map_sqlx_error("decode id", e))?;
    let name: String = row.try_get("name").map_err(|e| map_sqlx_error("decode name", e))?;
    let email: String = row.try_get("email").map_err(|e| map_sqlx_error("decode email", e))?;
    let password_hash: String = row
        .try_get("password_hash")
        .map_err(|e| map_sqlx_error("decode password_hash", e))?;
    let created_at: DateTime<Utc> = row
        .try_get("created_at")
        .map_err(|e| map_sqlx_error("decode created_at", e))?;

    let id = u64::try_from(id).map_err(|_| StoreError::Backend(format!("negative user id {id}")))?;
    let email = Email::parse(&email).map_err(|e| StoreError::Backend(format!("stored email: {e}")))?;

    Ok(Principal {
        id: PrincipalId::new(id),
        name,
        email,
        password_hash: PasswordHash::from_encoded(password_hash),
        created_at,
    })
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                _ => StoreError::Backend(msg),
            }
        }
        other => StoreError::Backend(format!("{operation}: {other}")),
    }
}
