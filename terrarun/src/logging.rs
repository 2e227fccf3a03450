//! Diagnostics via `tracing`.
//!
//! Diagnostics go to stderr. Tool output echoed during a run and the final
//! report go to stdout, unaffected by `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`. Defaults to `terrarun=info` if unset.
///
/// # Example
/// ```bash
/// RUST_LOG=terrarun=debug terrarun run --command plan
/// ```
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("terrarun=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
