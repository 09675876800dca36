//! Process-wide logging setup for the moldtrack binaries.

/// Tracing subscriber configuration.
pub mod tracing;

/// Install the global tracing subscriber.
///
/// Idempotent; only the first call in a process wins.
pub fn init() {
    tracing::init();
}
