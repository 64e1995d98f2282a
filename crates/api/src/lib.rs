//! HTTP API: request pipeline, routing, and request/response mapping.

pub mod app;
pub mod context;
pub mod middleware;
pub mod server;
pub mod validation;
pub mod version;
