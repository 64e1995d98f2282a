//! HTTP application wiring.
//!
//! - `services.rs`: composition root (stores, cache, policy, token service)
//! - `routes/`: handlers grouped by area
//! - `dto.rs`: request/response bodies and the response envelope
//! - `errors.rs`: error → envelope mapping

use std::sync::Arc;

use axum::{Extension, Router, middleware::from_fn, middleware::from_fn_with_state};
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;

use keystone_infra::AppConfig;

use crate::middleware::{self, AuthState, PolicyState};

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

use services::AppServices;

/// Build the application from configuration (used by `main`).
pub async fn build_app(config: &AppConfig) -> anyhow::Result<Router> {
    let services = services::build_services(config).await?;
    Ok(build_router(Arc::new(services)))
}

/// Assemble the router over already-built services.
///
/// `route_layer` keeps the auth stages off the fallback, so unknown paths
/// answer 404 rather than 401.
pub fn build_router(services: Arc<AppServices>) -> Router {
    let auth_state = AuthState {
        tokens: services.tokens.clone(),
    };
    let policy_state = PolicyState {
        enforcer: services.policy.clone(),
    };

    let gated = routes::gated().route_layer(from_fn_with_state(policy_state, middleware::authorize_middleware));

    // Layers added later run first: authenticate wraps authorize.
    let protected = routes::authenticated()
        .merge(gated)
        .route_layer(from_fn_with_state(auth_state, middleware::auth_middleware));

    let router = Router::new()
        .merge(routes::public())
        .merge(protected)
        .fallback(routes::system::not_found);

    with_global_stages(router, services)
}

/// Stages every request passes through, outermost first: trace, version,
/// panic recovery. A panicking handler still gets the 500 envelope and both
/// header stamps.
pub fn with_global_stages(router: Router, services: Arc<AppServices>) -> Router {
    router.layer(
        ServiceBuilder::new()
            .layer(from_fn(middleware::trace_middleware))
            .layer(from_fn(middleware::version_middleware))
            .layer(CatchPanicLayer::custom(errors::panic_response))
            .layer(Extension(services)),
    )
}
