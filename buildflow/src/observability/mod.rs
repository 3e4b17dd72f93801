//! Observability utilities.

mod logging;

pub use logging::{init_logging, parse_level, LoggingConfig, ENV_LOG_JSON, ENV_LOG_LEVEL};
