//! Logging setup for the binaries.
//!
//! Events go to stderr so stdout stays reserved for query results. `RUST_LOG`
//! overrides the default `info` level, e.g. `RUST_LOG=blobindex=debug`.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

/// Installs the global subscriber. Later calls are no-ops.
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
