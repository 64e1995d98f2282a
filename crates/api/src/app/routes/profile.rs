use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::Response};

use crate::app::dto::{self, ProtectedResource};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

/// `GET /profile`: the caller's own profile, read through the cache.
pub async fn me(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Result<Response, ApiError> {
    let profile = services.profiles.get_profile(principal.principal_id()).await?;
    Ok(dto::ok(StatusCode::OK, "ok", profile))
}

/// `GET /protected-resource`: only reachable once the policy has granted it.
pub async fn protected_resource(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Result<Response, ApiError> {
    let profile = services.profiles.get_profile(principal.principal_id()).await?;
    Ok(dto::ok(
        StatusCode::OK,
        "access granted",
        ProtectedResource {
            resource: "protected-resource",
            principal: profile,
        },
    ))
}
