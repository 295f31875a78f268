//! Optional tracing-subscriber initialization
//!
//! The library itself only emits `tracing` events; binaries, examples, and
//! ad-hoc test runs can call [`init`] to get a formatted subscriber honoring
//! `RUST_LOG`. Gated behind the `logging` feature (on by default).

use tracing_subscriber::EnvFilter;

/// Installs a formatted global subscriber filtered by `RUST_LOG`,
/// defaulting to `info`. Safe to call more than once; only the first call
/// installs.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
