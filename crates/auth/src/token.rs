//! HS256 bearer-token issuance and verification.
//!
//! Tokens are stateless: there is no server-side session or revocation list,
//! so a token stays valid until it expires.

use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use keystone_core::{DomainError, PrincipalId};

use crate::claims::{TokenClaims, TokenValidationError, validate_claims};

/// Longest token lifetime accepted by [`TokenService::new`].
pub const MAX_TOKEN_TTL: Duration = Duration::from_secs(366 * 24 * 60 * 60);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("invalid token service configuration: {0}")]
    Config(String),

    #[error("token signing failed: {0}")]
    Signing(String),

    #[error("token is malformed")]
    Malformed,

    #[error("token signature mismatch")]
    BadSignature,

    #[error("token issuer mismatch")]
    WrongIssuer,

    #[error("token subject is not a principal id")]
    InvalidSubject,

    #[error(transparent)]
    Claims(#[from] TokenValidationError),
}

impl From<TokenError> for DomainError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Config(msg) | TokenError::Signing(msg) => DomainError::dependency(msg),
            other => DomainError::authentication(other.to_string()),
        }
    }
}

/// A freshly signed token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub claims: TokenClaims,
}

impl IssuedToken {
    /// Lifetime in whole seconds, as reported to clients.
    pub fn expires_in(&self) -> i64 {
        (self.claims.expires_at - self.claims.issued_at).num_seconds()
    }
}

/// On-the-wire claim set (registered JWT claim names).
#[derive(Debug, Serialize, Deserialize)]
struct WireClaims {
    sub: String,
    iss: String,
    iat: i64,
    exp: i64,
}

/// Signs and verifies tokens with one process-wide shared secret.
///
/// Construct once at startup from configuration and share the same instance
/// between the login path (issue) and the authentication stage (verify).
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    issuer: String,
    ttl: chrono::Duration,
}

impl core::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenService")
            .field("issuer", &self.issuer)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(secret: impl AsRef<[u8]>, issuer: impl Into<String>, ttl: Duration) -> Result<Self, TokenError> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(TokenError::Config("secret must not be empty".to_string()));
        }
        if ttl < Duration::from_secs(1) || ttl > MAX_TOKEN_TTL {
            return Err(TokenError::Config(format!("ttl {ttl:?} out of range")));
        }
        let ttl = chrono::Duration::from_std(ttl).map_err(|e| TokenError::Config(e.to_string()))?;
        let issuer = issuer.into();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_issuer(&[issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            issuer,
            ttl,
        })
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn issue(&self, sub: PrincipalId) -> Result<IssuedToken, TokenError> {
        self.issue_at(sub, Utc::now())
    }

    /// Issue a token as if the current time were `now`.
    pub fn issue_at(&self, sub: PrincipalId, now: DateTime<Utc>) -> Result<IssuedToken, TokenError> {
        let iat = now.timestamp();
        let exp = iat + self.ttl.num_seconds();

        let wire = WireClaims {
            sub: sub.to_string(),
            iss: self.issuer.clone(),
            iat,
            exp,
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &wire, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        Ok(IssuedToken {
            token,
            claims: wire_to_claims(wire)?,
        })
    }

    pub fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        self.verify_at(token, Utc::now())
    }

    /// Verify signature, issuer and time window relative to `now`.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<TokenClaims, TokenError> {
        let data = jsonwebtoken::decode::<WireClaims>(token, &self.decoding, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => TokenError::BadSignature,
                ErrorKind::ExpiredSignature => TokenError::Claims(TokenValidationError::Expired),
                ErrorKind::ImmatureSignature => TokenError::Claims(TokenValidationError::NotYetValid),
                ErrorKind::InvalidIssuer => TokenError::WrongIssuer,
                _ => TokenError::Malformed,
            })?;

        let claims = wire_to_claims(data.claims)?;
        validate_claims(&claims, now)?;
        Ok(claims)
    }
}

fn wire_to_claims(wire: WireClaims) -> Result<TokenClaims, TokenError> {
    let sub = wire.sub.parse::<PrincipalId>().map_err(|_| TokenError::InvalidSubject)?;
    let issued_at = DateTime::from_timestamp(wire.iat, 0).ok_or(TokenError::Malformed)?;
    let expires_at = DateTime::from_timestamp(wire.exp, 0).ok_or(TokenError::Malformed)?;

    Ok(TokenClaims {
        sub,
        issuer: wire.iss,
        issued_at,
        expires_at,
    })
}
