//! Tracing setup shared by the medcab binaries.
//!
//! Log lines go to stderr so they never mix with command output on stdout.
//! The filter comes from `MEDCAB_LOG`, then `RUST_LOG`, then the default level.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Env var checked before `RUST_LOG`
pub const LOG_ENV: &str = "MEDCAB_LOG";

/// Initialize logging at WARN unless overridden
pub fn init() {
    init_with_level("warn")
}

/// Initialize logging with `default_level` (debug, info, warn, error)
pub fn init_with_level(default_level: &str) {
    tracing_subscriber::registry()
        .with(filter(default_level))
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}

fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Route debug logs into captured test output; repeat calls are no-ops
#[cfg(test)]
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::new("debug"))
        .try_init();
}
