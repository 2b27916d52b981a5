//! Logging setup for binaries embedding the bridge.
//!
//! Installs a global `tracing` subscriber that prints to stderr. The level
//! comes from `RUST_LOG` and defaults to `default_directive` (for example
//! `"info"` or `"facebridge=debug"`).
//!
//! Runtime events reach this output through [`LogWriter`](crate::LogWriter).

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber.
///
/// # Errors
///
/// Returns an error if a global subscriber is already set.
pub fn init_logging(default_directive: &str) -> Result<(), tracing_subscriber::util::TryInitError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .try_init()
}
