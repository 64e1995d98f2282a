use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::{
    Json, Router,
    extract::Extension,
    http::StatusCode,
    response::Response,
    routing::post,
};

use keystone_core::Email;
use keystone_infra::NewAccount;

use crate::app::dto::{self, LoginRequest, LoginResponse, RegisterRequest};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body?;
    services.validator.validate(&body)?;

    let account = NewAccount {
        name: body.name.trim().to_string(),
        email: Email::parse(&body.email)?,
        password: body.password,
    };
    let profile = services.accounts.register(account).await?;

    Ok(dto::ok(StatusCode::CREATED, "registered", profile))
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body?;
    services.validator.validate(&body)?;

    let outcome = services.accounts.login(&body.email, &body.password).await?;

    Ok(dto::ok(
        StatusCode::OK,
        "logged in",
        LoginResponse {
            token: outcome.token,
            principal: outcome.profile,
            expires_in: outcome.expires_in,
        },
    ))
}
