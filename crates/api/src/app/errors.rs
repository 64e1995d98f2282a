//! Consistent error responses.
//!
//! Every failure leaves the service as the standard envelope with a non-zero
//! `code` (the HTTP status) and a human-readable message. Dependency failures
//! are logged with their detail and answered with a generic message.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use keystone_core::DomainError;
use keystone_infra::{AccountError, ProfileError};

use crate::app::dto::Envelope;

const INTERNAL_MESSAGE: &str = "internal server error";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError(pub DomainError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            DomainError::Validation(_) => StatusCode::BAD_REQUEST,
            DomainError::Authentication(_) => StatusCode::UNAUTHORIZED,
            DomainError::Authorization(_) => StatusCode::FORBIDDEN,
            DomainError::NotFound(_) => StatusCode::NOT_FOUND,
            DomainError::Conflict(_) => StatusCode::CONFLICT,
            DomainError::Dependency(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message clients see.
    pub fn public_message(&self) -> String {
        match &self.0 {
            DomainError::Dependency(_) => INTERNAL_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(kind = self.0.kind(), error = %self.0, "request failed");
        } else {
            tracing::debug!(kind = self.0.kind(), error = %self.0, "request rejected");
        }

        json_error(status, self.public_message())
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        Self(err.into())
    }
}

impl From<ProfileError> for ApiError {
    fn from(err: ProfileError) -> Self {
        Self(err.into())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(DomainError::validation(rejection.body_text()))
    }
}

/// Answer for a handler that panicked: the standard 500 envelope.
pub fn panic_response(panic: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("non-string panic payload");
    tracing::error!(panic = detail, "handler panicked");

    json_error(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE)
}

pub fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    let body = Envelope {
        code: status.as_u16(),
        message: message.into(),
        data: serde_json::Value::Null,
    };
    (status, axum::Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_statuses() {
        let cases = [
            (DomainError::validation("x"), StatusCode::BAD_REQUEST),
            (DomainError::authentication("x"), StatusCode::UNAUTHORIZED),
            (DomainError::authorization("x"), StatusCode::FORBIDDEN),
            (DomainError::not_found("x"), StatusCode::NOT_FOUND),
            (DomainError::conflict("x"), StatusCode::CONFLICT),
            (DomainError::dependency("x"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).status(), status);
        }
    }

    #[test]
    fn dependency_detail_is_not_exposed() {
        let err = ApiError(DomainError::dependency("connection refused to 10.0.0.5"));
        assert_eq!(err.public_message(), INTERNAL_MESSAGE);
    }

    #[test]
    fn panics_answer_with_the_generic_envelope() {
        let res = panic_response(Box::new("index out of bounds".to_string()));
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let res = panic_response(Box::new(42_u8));
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn login_failures_share_one_message() {
        let err = ApiError::from(AccountError::InvalidCredentials);
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.public_message(), "invalid credentials");
    }
}
