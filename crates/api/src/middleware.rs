//! Request pipeline stages.
//!
//! Order on a permission-gated route: trace → version → authenticate →
//! authorize → handler. Public routes only get the trace and version stages.
//! Any stage can answer the request itself, in which case nothing downstream
//! runs.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, Method},
    middleware::Next,
    response::Response,
};
use tracing::{Instrument, debug, error, info, info_span};
use uuid::Uuid;

use keystone_auth::{PolicyEnforcer, TokenService};
use keystone_core::DomainError;

use crate::app::errors::ApiError;
use crate::context::{PrincipalContext, TraceContext};
use crate::version;

pub const TRACE_HEADER: HeaderName = HeaderName::from_static("x-trace-id");
pub const VERSION_HEADER: HeaderName = HeaderName::from_static("x-app-version");
pub const COMMIT_HEADER: HeaderName = HeaderName::from_static("x-app-commit");

/// Trace stage: fresh correlation id, request span, `X-Trace-ID` header and a
/// completion log line with status and latency. Always proceeds.
pub async fn trace_middleware(mut req: Request, next: Next) -> Response {
    let trace_id = Uuid::now_v7();
    let started = Instant::now();

    let span = info_span!(
        "request",
        %trace_id,
        method = %req.method(),
        path = %req.uri().path(),
    );
    req.extensions_mut().insert(TraceContext::new(trace_id));

    let mut response = next.run(req).instrument(span.clone()).await;

    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    span.in_scope(|| {
        info!(status = response.status().as_u16(), latency_ms, "request completed");
    });

    if let Ok(value) = HeaderValue::from_str(&trace_id.to_string()) {
        response.headers_mut().insert(TRACE_HEADER, value);
    }
    response
}

/// Version stage: stamps build metadata on every response.
pub async fn version_middleware(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;

    let headers = response.headers_mut();
    for (name, value) in [(VERSION_HEADER, version::VERSION), (COMMIT_HEADER, version::COMMIT)] {
        if let Ok(value) = HeaderValue::from_str(value) {
            headers.insert(name, value);
        }
    }
    response
}

#[derive(Clone)]
pub struct AuthState {
    pub tokens: Arc<TokenService>,
}

/// Auth stage: verify the bearer token and attach the principal.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer(req.headers())?;

    let claims = state.tokens.verify(token).map_err(|e| {
        debug!(error = %e, "bearer token rejected");
        DomainError::authentication("invalid or expired token")
    })?;

    req.extensions_mut().insert(PrincipalContext::new(claims.sub));

    Ok(next.run(req).await)
}

#[derive(Clone)]
pub struct PolicyState {
    pub enforcer: Arc<dyn PolicyEnforcer>,
}

/// Authorization stage: `(principal id, request path, method)` must be
/// granted by the policy. Refuses to run without an authenticated principal.
///
/// `HEAD` is checked as `GET`, since the router serves it from the `GET` route.
pub async fn authorize_middleware(
    State(state): State<PolicyState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(principal) = req.extensions().get::<PrincipalContext>().copied() else {
        return Err(DomainError::authentication("authentication required").into());
    };

    let subject = principal.principal_id().to_string();
    let object = req.uri().path().to_string();
    let action = policy_action(req.method()).to_string();

    match state.enforcer.enforce(&subject, &object, &action) {
        Ok(true) => Ok(next.run(req).await),
        Ok(false) => {
            info!(%subject, %object, %action, "permission denied");
            Err(DomainError::authorization("permission denied").into())
        }
        Err(e) => {
            error!(%subject, %object, %action, error = %e, "policy evaluation failed");
            Err(DomainError::dependency(e.to_string()).into())
        }
    }
}

fn policy_action(method: &Method) -> &str {
    if *method == Method::HEAD { "GET" } else { method.as_str() }
}

/// Expects exactly `Bearer <token>`: two parts separated by a single space.
fn extract_bearer(headers: &HeaderMap) -> Result<&str, DomainError> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(|| DomainError::authentication("missing authorization header"))?;

    let header = header
        .to_str()
        .map_err(|_| DomainError::authentication("malformed authorization header"))?;

    match header.split(' ').collect::<Vec<_>>().as_slice() {
        ["Bearer", token] if !token.is_empty() => Ok(*token),
        _ => Err(DomainError::authentication("malformed authorization header")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Router,
        body::Body,
        http::{StatusCode, header::AUTHORIZATION},
        middleware::{from_fn, from_fn_with_state},
        routing::get,
    };
    use keystone_auth::{PolicyError, RbacPolicy};
    use keystone_core::PrincipalId;
    use tower::ServiceExt;

    /// Enforcer whose backing rule set is gone.
    struct UnavailableEnforcer;

    impl PolicyEnforcer for UnavailableEnforcer {
        fn enforce(&self, _subject: &str, _object: &str, _action: &str) -> Result<bool, PolicyError> {
            Err(PolicyError::Unavailable)
        }
    }

    async fn as_principal_7(mut req: Request, next: Next) -> Response {
        req.extensions_mut().insert(PrincipalContext::new(PrincipalId::new(7)));
        next.run(req).await
    }

    /// `/r` behind authorize only; `authenticated` puts a fixed principal in front.
    fn gated(enforcer: Arc<dyn PolicyEnforcer>, authenticated: bool) -> Router {
        let router = Router::new()
            .route("/r", get(|| async { "granted" }).post(|| async { "granted" }))
            .route_layer(from_fn_with_state(PolicyState { enforcer }, authorize_middleware));
        if authenticated {
            router.route_layer(from_fn(as_principal_7))
        } else {
            router
        }
    }

    async fn call(router: Router, method: Method) -> (StatusCode, serde_json::Value) {
        let req = axum::http::Request::builder().method(method).uri("/r").body(Body::empty()).unwrap();
        let res = router.oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn authorize_without_authentication_is_unauthorized() {
        let policy = Arc::new(RbacPolicy::from_csv("p, 7, /r, GET").unwrap());
        let (status, body) = call(gated(policy, false), Method::GET).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], 401);
        assert_eq!(body["message"], "authentication required");
    }

    #[tokio::test]
    async fn enforcer_failure_is_a_generic_server_error() {
        let (status, body) = call(gated(Arc::new(UnavailableEnforcer), true), Method::GET).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], 500);
        assert_eq!(body["message"], "internal server error");
    }

    #[tokio::test]
    async fn head_is_authorized_as_get() {
        let policy = Arc::new(RbacPolicy::from_csv("p, 7, /r, GET").unwrap());

        let (status, _) = call(gated(policy.clone(), true), Method::HEAD).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(gated(policy, true), Method::POST).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "permission denied");
    }

    #[test]
    fn policy_action_maps_head_only() {
        assert_eq!(policy_action(&Method::HEAD), "GET");
        assert_eq!(policy_action(&Method::GET), "GET");
        assert_eq!(policy_action(&Method::DELETE), "DELETE");
    }

    fn headers(value: &str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        map
    }

    #[test]
    fn extracts_well_formed_bearer() {
        assert_eq!(extract_bearer(&headers("Bearer abc.def.ghi")), Ok("abc.def.ghi"));
    }

    #[test]
    fn missing_header_is_rejected() {
        assert_eq!(
            extract_bearer(&HeaderMap::new()),
            Err(DomainError::authentication("missing authorization header"))
        );
    }

    #[test]
    fn malformed_headers_are_rejected() {
        for value in ["Bearer", "Bearer ", "bearer abc", "Basic abc", "Bearer a b", "Bearer  abc", "abc"] {
            assert!(extract_bearer(&headers(value)).is_err(), "accepted {value:?}");
        }
    }
}
