//! Tracing subscriber setup for the daemon; the library itself only emits
//! `tracing` events.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Install the global subscriber.  `RUST_LOG` wins over the configured
/// level.  Safe to call once per process; later calls are ignored.
pub fn init_tracing(config: &LoggingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.level.clone()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(config.show_target)
        .try_init();
}
