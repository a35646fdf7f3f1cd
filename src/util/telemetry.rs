//! Telemetry helpers for structured logging and tracing.
//!
//! Pollers log through `tracing`; nothing is printed unless the embedding
//! application (or one of these helpers) installs a subscriber.

/// Initialize tracing with the filter taken from `RUST_LOG`. Users can install
/// their own subscriber; this helper only installs one if none is set.
pub fn init_tracing() {
    init_tracing_with("warn");
}

/// Initialize tracing, falling back to `default_directive` (e.g. `"info"` or
/// `"prometheus_poller=debug"`) when `RUST_LOG` is absent or invalid.
pub fn init_tracing_with(default_directive: &str) {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
