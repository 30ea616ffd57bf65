//! Diagnostic logging.
//!
//! Stdout carries JSON-RPC frames, so the subscriber writes to stderr only.

use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;

/// Filter used when neither `RUST_LOG` nor `--debug` is given.
pub fn build_filter(default_level: &str, debug: bool) -> EnvFilter {
    if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    }
}

/// Install the global subscriber. A second call is a no-op.
pub fn init(default_level: &str, debug: bool) {
    let filter = build_filter(default_level, debug);
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .try_init();
}
