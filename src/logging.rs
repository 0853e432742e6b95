//! Diagnostic tracing for embedders.
//!
//! Library code only emits `tracing` events; installing a subscriber is
//! left to the binary or test harness that embeds the crate.

use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, util::TryInitError, EnvFilter,
};

/// Install the global subscriber, or do nothing if one is already set.
///
/// Reads `RUST_LOG`. Defaults to `warn` if unset.
/// Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=devpilot=debug,devpilot_tools=debug my-agent
/// ```
pub fn init() {
    if try_init().is_err() {
        tracing::debug!("Global tracing subscriber already installed");
    }
}

/// Install the global subscriber, failing if one is already set.
pub fn try_init() -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init()
}
