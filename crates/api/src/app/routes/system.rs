use axum::http::StatusCode;
use axum::response::Response;

use crate::app::dto::{self, Welcome};
use crate::app::errors::json_error;
use crate::version;

pub async fn welcome() -> Response {
    dto::ok(
        StatusCode::OK,
        "welcome",
        Welcome {
            service: "keystone",
            build: version::BUILD_INFO,
        },
    )
}

pub async fn health() -> Response {
    dto::ok(StatusCode::OK, "ok", serde_json::Value::Null)
}

pub async fn not_found() -> Response {
    json_error(StatusCode::NOT_FOUND, "route not found")
}
