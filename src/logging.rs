//! Tracing setup for the sync core.
//!
//! The TUI/CLI wrapper owns verbosity flags and log destinations; this
//! module only provides the one-line `tracing-subscriber` init the core's
//! own `tracing::{debug,info,warn}`
//! calls expect to be initialized exactly once by whichever binary embeds
//! this crate.

use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize a default `EnvFilter`-driven subscriber. Safe to call more
/// than once; only the first call takes effect.
pub fn init_logging() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .try_init();
    });
}

/// Initialize logging for tests, capturing output via the test writer.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("debug")
            .with_test_writer()
            .try_init();
    });
}
