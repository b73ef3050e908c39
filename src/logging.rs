//! Logging initialization.
//!
//! Installs a stderr `fmt` layer filtered by an `EnvFilter`. `RUST_LOG`
//! takes precedence over the configured filter.

use crate::config::LoggingConfig;
use tracing::Subscriber;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber.
///
/// Returns `false` when a subscriber was already installed, in which case
/// the existing one stays in place.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| parse_filter(&config.filter));

    build_subscriber(filter, config.with_target)
        .try_init()
        .is_ok()
}

fn build_subscriber(filter: EnvFilter, with_target: bool) -> impl Subscriber + Send + Sync {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(with_target)
        .with_filter(filter);

    tracing_subscriber::registry().with(stderr_layer)
}

fn parse_filter(directives: &str) -> EnvFilter {
    EnvFilter::try_new(directives).unwrap_or_else(|e| {
        eprintln!("Invalid log filter '{directives}': {e}. Falling back to 'warn'");
        EnvFilter::new("warn")
    })
}
