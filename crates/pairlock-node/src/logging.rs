//! Tracing subscriber setup.
//!
//! - WARN: rejected messages
//! - INFO: requests, entries, pairings, releases
//! - DEBUG: deferrals and per-message decisions

use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `RUST_LOG` overrides the default `info`.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}
