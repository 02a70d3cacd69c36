//! ==============================================================================
//! logging.rs - structured logging setup
//! ==============================================================================
//!
//! purpose:
//!     installs the global `tracing` subscriber. `RUST_LOG` wins when set,
//!     otherwise the `[logging] level` from dashboard.toml is used.
//!
//! ==============================================================================

use crate::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// build the filter without installing anything
pub fn filter_for(config: &LoggingConfig) -> EnvFilter {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    filter_from(env.as_deref(), &config.level)
}

/// `env` (a RUST_LOG value) first, then `level`, then plain info
pub fn filter_from(env: Option<&str>, level: &str) -> EnvFilter {
    env.and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_new(level).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

/// install the fmt subscriber; fails if one is already installed
pub fn init(config: &LoggingConfig) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(filter_for(config))
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install log subscriber: {}", e))
}

// ==============================================================================
// tests
// ==============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_level_is_used_without_env() {
        assert_eq!(filter_from(None, "debug").to_string(), "debug");
    }

    #[test]
    fn env_wins_over_configured_level() {
        assert_eq!(filter_from(Some("warn"), "debug").to_string(), "warn");
    }

    #[test]
    fn unparsable_env_falls_back_to_level() {
        assert_eq!(filter_from(Some("motor=loud"), "debug").to_string(), "debug");
    }

    #[test]
    fn unparsable_level_falls_back_to_info() {
        assert_eq!(filter_from(None, "motor=loud").to_string(), "info");
    }
}
