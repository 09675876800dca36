//! Tracing subscriber wiring.

use tracing_subscriber::EnvFilter;

/// Install a JSON-formatted subscriber at `info` unless `RUST_LOG` says
/// otherwise.
///
/// `try_init` keeps repeated calls (tests spin the server up many times in
/// one process) from panicking on the second registration.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}
