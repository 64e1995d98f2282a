use axum::{Router, routing::get};

pub mod accounts;
pub mod profile;
pub mod system;

/// Routes open to anyone.
pub fn public() -> Router {
    Router::new()
        .route("/", get(system::welcome))
        .route("/health", get(system::health))
        .merge(accounts::router())
}

/// Routes that need an authenticated principal.
pub fn authenticated() -> Router {
    Router::new().route("/profile", get(profile::me))
}

/// Routes that additionally need a policy grant for `(principal, path, method)`.
pub fn gated() -> Router {
    Router::new().route("/protected-resource", get(profile::protected_resource))
}
