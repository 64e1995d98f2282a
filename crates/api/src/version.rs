//! Build metadata.
//!
//! `APP_VERSION`, `GIT_COMMIT` and `BUILD_TIME` are read from the build
//! environment at compile time; unset values fall back to the crate version,
//! `"none"` and `"unknown"`.

use serde::Serialize;

pub const VERSION: &str = match option_env!("APP_VERSION") {
    Some(v) => v,
    None => env!("CARGO_PKG_VERSION"),
};

pub const COMMIT: &str = match option_env!("GIT_COMMIT") {
    Some(c) => c,
    None => "none",
};

pub const BUILD_TIME: &str = match option_env!("BUILD_TIME") {
    Some(t) => t,
    None => "unknown",
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BuildInfo {
    pub version: &'static str,
    pub commit: &'static str,
    pub build_time: &'static str,
}

pub const BUILD_INFO: BuildInfo = BuildInfo {
    version: VERSION,
    commit: COMMIT,
    build_time: BUILD_TIME,
};
