//! Tracing setup for binaries and tests

use tracing_subscriber::EnvFilter;

/// Install a global `fmt` subscriber, reading `RUST_LOG` with an `info`
/// fallback. Safe to call more than once; later calls are no-ops.
pub fn init() {
    init_with_filter("info");
}

/// Same as [`init`] but with an explicit fallback filter.
pub fn init_with_filter(fallback: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
