#![forbid(unsafe_code)]

//! Logging setup.
//!
//! All crates log through `tracing`. Binaries and tests that want output call
//! [`init`] (feature `subscriber`), which installs a `tracing-subscriber`
//! formatter filtered by the `STAGEHAND_LOG` environment variable.
//!
//! ```bash
//! STAGEHAND_LOG=stagehand_runtime=debug cargo run
//! ```

/// Environment variable holding the filter directive.
pub const LOG_ENV: &str = "STAGEHAND_LOG";

/// Filter used when `STAGEHAND_LOG` is unset or unparsable.
pub const DEFAULT_FILTER: &str = "warn";

/// Subscriber settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Filter directive used when the environment does not provide one.
    pub default_filter: String,
    /// Emit JSON lines instead of human-readable text.
    pub json: bool,
    /// Write to the test writer (captured by `cargo test`).
    pub test_writer: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_filter: DEFAULT_FILTER.to_owned(),
            json: false,
            test_writer: false,
        }
    }
}

impl LogConfig {
    /// Settings suited to unit and integration tests.
    #[must_use]
    pub fn for_tests() -> Self {
        Self {
            default_filter: "debug".to_owned(),
            json: false,
            test_writer: true,
        }
    }

    /// The filter directive to use: the environment first, then the default.
    pub fn resolved_filter(&self) -> String {
        std::env::var(LOG_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| self.default_filter.clone())
    }
}

/// Install the global subscriber.
///
/// Returns `false` when a subscriber was already installed (for example by an
/// earlier test in the same process), which is not an error.
#[cfg(feature = "subscriber")]
pub fn init(config: &LogConfig) -> bool {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(config.resolved_filter())
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true);

    #[cfg(feature = "json")]
    if config.json {
        return if config.test_writer {
            builder.json().with_test_writer().try_init().is_ok()
        } else {
            builder.json().try_init().is_ok()
        };
    }

    if config.test_writer {
        builder.with_test_writer().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    }
}

/// Without the `subscriber` feature there is nothing to install.
#[cfg(not(feature = "subscriber"))]
pub fn init(_config: &LogConfig) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_warn() {
        let config = LogConfig::default();
        assert_eq!(config.default_filter, "warn");
        assert!(!config.json);
    }

    #[test]
    fn test_config_captures_output() {
        let config = LogConfig::for_tests();
        assert!(config.test_writer);
        assert!(!config.resolved_filter().is_empty());
    }

    #[cfg(feature = "subscriber")]
    #[test]
    fn init_is_idempotent() {
        let config = LogConfig::for_tests();
        let _ = init(&config);
        assert!(!init(&config));
    }
}
