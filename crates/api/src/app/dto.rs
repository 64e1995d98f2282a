use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use keystone_auth::{MAX_PASSWORD_BYTES, Profile};

use crate::version::BuildInfo;

/// Response envelope shared by every endpoint.
///
/// `code` is `0` on success and the HTTP status on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub code: u16,
    pub message: String,
    pub data: T,
}

pub fn ok<T: Serialize>(status: StatusCode, message: impl Into<String>, data: T) -> Response {
    let body = Envelope {
        code: 0,
        message: message.into(),
        data,
    };
    (status, axum::Json(body)).into_response()
}

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,

    #[validate(email)]
    pub email: String,

    /// bcrypt only looks at the first 72 bytes, so the upper bound is in
    /// bytes, not characters.
    #[validate(length(min = 6), custom(function = "within_bcrypt_limit"))]
    pub password: String,
}

fn within_bcrypt_limit(password: &str) -> Result<(), ValidationError> {
    if password.len() <= MAX_PASSWORD_BYTES {
        return Ok(());
    }
    let mut err = ValidationError::new("bcrypt_bytes");
    err.add_param("max".into(), &MAX_PASSWORD_BYTES);
    Err(err)
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1))]
    pub email: String,

    #[validate(length(min = 1))]
    pub password: String,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub principal: Profile,
    #[serde(rename = "expiresIn")]
    pub expires_in: i64,
}

#[derive(Debug, Serialize)]
pub struct ProtectedResource {
    pub resource: &'static str,
    pub principal: Profile,
}

#[derive(Debug, Serialize)]
pub struct Welcome {
    pub service: &'static str,
    #[serde(flatten)]
    pub build: BuildInfo,
}
