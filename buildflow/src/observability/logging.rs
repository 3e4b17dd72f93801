//! Structured logging setup.
//!
//! Logs go to stderr so stdout stays free for tooling. `RUST_LOG`, when
//! set, replaces the computed filter entirely.
//!
//! # Example
//!
//! ```no_run
//! use buildflow::observability::{init_logging, LoggingConfig};
//! use tracing::Level;
//!
//! init_logging(&LoggingConfig::with_level(Level::DEBUG));
//! tracing::info!(components = 11, "Build plan ready");
//! ```

use std::env;
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding the default log level.
pub const ENV_LOG_LEVEL: &str = "BUILDFLOW_LOG_LEVEL";
/// Environment variable enabling JSON log output.
pub const ENV_LOG_JSON: &str = "BUILDFLOW_LOG_JSON";

static INIT: Once = Once::new();

/// Configuration for logging initialization.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Minimum level for buildflow's own events.
    pub level: Level,
    /// Emit one JSON object per event.
    pub use_json: bool,
    /// Include the module target in each line.
    pub include_target: bool,
    /// Include file and line.
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            use_json: false,
            include_target: true,
            include_location: false,
        }
    }
}

impl LoggingConfig {
    /// Creates a configuration with the given level.
    #[must_use]
    pub fn with_level(level: Level) -> Self {
        Self {
            level,
            ..Self::default()
        }
    }

    /// Switches to JSON output.
    #[must_use]
    pub fn json(mut self, use_json: bool) -> Self {
        self.use_json = use_json;
        self
    }

    /// Reads `BUILDFLOW_LOG_LEVEL` and `BUILDFLOW_LOG_JSON`.
    #[must_use]
    pub fn from_env() -> Self {
        let level = env::var(ENV_LOG_LEVEL)
            .ok()
            .and_then(|v| parse_level(&v))
            .unwrap_or(Level::INFO);
        let use_json = env::var(ENV_LOG_JSON)
            .ok()
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(false);
        Self::with_level(level).json(use_json)
    }

    /// Filter directives applied when `RUST_LOG` is unset.
    #[must_use]
    pub fn directives(&self) -> String {
        format!("warn,buildflow={}", self.level)
    }
}

/// Parses a level name, case-insensitively.
#[must_use]
pub fn parse_level(level: &str) -> Option<Level> {
    match level.trim().to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Installs the global subscriber. Later calls are ignored.
pub fn init_logging(config: &LoggingConfig) {
    INIT.call_once(|| {
        let filter = if env::var_os("RUST_LOG").is_some() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::new(config.directives())
        };

        let registry = tracing_subscriber::registry().with(filter);
        // A subscriber may already be installed (e.g. by a test harness).
        let _ = if config.use_json {
            registry
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_target(config.include_target)
                        .with_file(config.include_location)
                        .with_line_number(config.include_location),
                )
                .try_init()
        } else {
            registry
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(config.include_target)
                        .with_file(config.include_location)
                        .with_line_number(config.include_location),
                )
                .try_init()
        };
    });
}
