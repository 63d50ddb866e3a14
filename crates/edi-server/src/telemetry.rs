//! Tracing subscriber setup

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::Config;

/// Install the global subscriber.
///
/// Development gets human-readable output with targets and at least `debug`;
/// everything else emits JSON lines filtered by `LOG_LEVEL`.
pub fn init_tracing(config: &Config) -> anyhow::Result<()> {
    let directive = if config.is_development() && config.log_level.eq_ignore_ascii_case("info") {
        "debug"
    } else {
        config.log_level.as_str()
    };
    let filter = EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    if config.is_development() {
        registry
            .with(fmt::layer().with_target(true).with_ansi(true))
            .try_init()?;
    } else {
        registry
            .with(fmt::layer().json().with_current_span(false).flatten_event(true))
            .try_init()?;
    }
    Ok(())
}
