//! Telemetry helpers for structured logging.

/// Initialize tracing. Users can install their own subscriber; this helper
/// installs a default env-based subscriber if none is set. Thread names are
/// included so per-worker log lines are attributable.
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_thread_names(true)
        .try_init();
}
