//! Tracing setup

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `default_directive` when set. Safe to call more
/// than once; later calls are ignored.
pub fn init_logging(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive.to_string()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}
