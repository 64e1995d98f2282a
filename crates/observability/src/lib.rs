//! Process-wide logging setup.

pub mod subscriber;

pub use subscriber::LogFormat;

/// Initialize tracing/logging for the process from `RUST_LOG` / `LOG_FORMAT`.
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    subscriber::init(LogFormat::from_env());
}
