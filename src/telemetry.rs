//! Tracing bootstrap.
//!
//! The core emits `tracing` events throughout (task churn at trace level,
//! lifecycle at debug, root-surfaced faults at error). Embedders with their
//! own subscriber should install it and skip this module; [`init`] is the
//! batteries-included setup for binaries and tests.

use tracing_subscriber::EnvFilter;

/// Install a formatted stderr subscriber honoring `RUST_LOG`.
///
/// Idempotent: a second call (or an already-installed global subscriber)
/// is a no-op.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
