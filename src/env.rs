//! Environment variable names used by this crate for configuring the
//! formatter from a deployed service.
//!
//! These are purely helpers; [`Formatter`](crate::formatter::Formatter)
//! itself never reads the environment.

use crate::formatter::FormatterConfig;
use crate::init::LayerConfig;
use tracing_subscriber::filter::LevelFilter;

/// Service name reported in `serviceContext.service`.
pub const SERVICE_ENV: &str = "STACKDRIVER_SERVICE";

/// Service version reported in `serviceContext.version`.
pub const VERSION_ENV: &str = "STACKDRIVER_VERSION";

/// Set to `1` or `true` to omit timestamps.
pub const NO_TIMESTAMP_ENV: &str = "STACKDRIVER_NO_TIMESTAMP";

/// Comma-separated module prefixes to skip during call-site attribution.
pub const STACK_SKIP_ENV: &str = "STACKDRIVER_STACK_SKIP";

/// Maximum level passed to the formatter (`trace`..`error`, or `off`).
pub const LOG_LEVEL_ENV: &str = "STACKDRIVER_LOG_LEVEL";

/// Service name set by Cloud Run, used when [`SERVICE_ENV`] is unset.
pub const CLOUD_RUN_SERVICE_ENV: &str = "K_SERVICE";

/// Revision name set by Cloud Run, used when [`VERSION_ENV`] is unset.
pub const CLOUD_RUN_REVISION_ENV: &str = "K_REVISION";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn flag(key: &str) -> bool {
    matches!(
        env_or(key, "").trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

impl FormatterConfig {
    /// Build a configuration from the `STACKDRIVER_*` variables, falling back
    /// to the Cloud Run service/revision variables. Unset variables keep the
    /// defaults.
    pub fn from_env() -> Self {
        let service = env_or(SERVICE_ENV, &env_or(CLOUD_RUN_SERVICE_ENV, ""));
        let version = env_or(VERSION_ENV, &env_or(CLOUD_RUN_REVISION_ENV, ""));
        let stack_skip = env_or(STACK_SKIP_ENV, "")
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        FormatterConfig {
            service,
            version,
            no_timestamp: flag(NO_TIMESTAMP_ENV),
            stack_skip,
        }
    }
}

impl LayerConfig {
    /// Default config with `max_level` taken from [`LOG_LEVEL_ENV`] when it
    /// holds a valid level filter.
    pub fn from_env() -> Self {
        let mut config = LayerConfig::default();
        // An empty string parses as `ERROR`, so blank counts as unset.
        let level = std::env::var(LOG_LEVEL_ENV)
            .ok()
            .filter(|s| !s.trim().is_empty())
            .and_then(|s| s.trim().parse::<LevelFilter>().ok());
        if let Some(level) = level {
            config.max_level = level;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear() {
        for key in [
            SERVICE_ENV,
            VERSION_ENV,
            NO_TIMESTAMP_ENV,
            STACK_SKIP_ENV,
            LOG_LEVEL_ENV,
            CLOUD_RUN_SERVICE_ENV,
            CLOUD_RUN_REVISION_ENV,
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn unset_environment_gives_defaults() {
        clear();
        assert_eq!(FormatterConfig::from_env(), FormatterConfig::default());
        assert_eq!(LayerConfig::from_env().max_level, LevelFilter::INFO);
    }

    #[test]
    #[serial]
    fn explicit_variables_win_over_cloud_run() {
        clear();
        std::env::set_var(SERVICE_ENV, "billing");
        std::env::set_var(CLOUD_RUN_SERVICE_ENV, "billing-run");
        std::env::set_var(CLOUD_RUN_REVISION_ENV, "billing-00042");
        std::env::set_var(NO_TIMESTAMP_ENV, "true");
        std::env::set_var(STACK_SKIP_ENV, "app::logwrap, app::audit ,");
        std::env::set_var(LOG_LEVEL_ENV, "debug");

        let config = FormatterConfig::from_env();
        assert_eq!(config.service, "billing");
        assert_eq!(config.version, "billing-00042");
        assert!(config.no_timestamp);
        assert_eq!(config.stack_skip, vec!["app::logwrap", "app::audit"]);
        assert_eq!(LayerConfig::from_env().max_level, LevelFilter::DEBUG);
        clear();
    }

    #[test]
    #[serial]
    fn blank_level_keeps_default() {
        clear();
        std::env::set_var(LOG_LEVEL_ENV, "  ");
        assert_eq!(LayerConfig::from_env().max_level, LevelFilter::INFO);
        clear();
    }

    #[test]
    #[serial]
    fn invalid_level_keeps_default() {
        clear();
        std::env::set_var(LOG_LEVEL_ENV, "loud");
        assert_eq!(LayerConfig::from_env().max_level, LevelFilter::INFO);
        clear();
    }
}
