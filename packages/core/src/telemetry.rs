//! Logging setup
//!
//! The library only emits `tracing` events; binaries and tests that want
//! them printed call [`init_tracing`] once at startup.

use tracing_subscriber::EnvFilter;

/// Install a `fmt` subscriber filtered by `RUST_LOG`
///
/// `default_directive` (e.g. `"info"` or `"pagespace_core=debug"`) applies
/// when `RUST_LOG` is unset or invalid. Returns false when a global
/// subscriber was already installed.
pub fn init_tracing(default_directive: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_ok()
}
