//! Logging setup for binaries embedding the server.

use tracing_subscriber::EnvFilter;

/// Installs a `fmt` subscriber filtered by `RUST_LOG`.
///
/// Falls back to `default_directive` (e.g. `"info"` or
/// `"courier=debug"`) when `RUST_LOG` is unset or unparsable. Does nothing
/// if a global subscriber is already installed, so tests may call it
/// repeatedly.
pub fn init_tracing(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
