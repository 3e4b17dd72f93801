//! Orchestration settings.
//!
//! Settings are read from a JSON file shaped `{"orchestration": {...}}`,
//! then environment overrides, then command-line overrides. Only
//! `max_parallel_agents` is required.
//!
//! # Environment Variables
//!
//! - `BUILDFLOW_MAX_PARALLEL_AGENTS`: overrides `max_parallel_agents`
//! - `BUILDFLOW_LOG_LEVEL`: log level, read by the binary

use crate::collaborators::RetryConfig;
use crate::errors::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default location of the settings file.
pub const DEFAULT_CONFIG_PATH: &str = "orchestration/orchestration-config.json";
/// Environment variable overriding `max_parallel_agents`.
pub const ENV_MAX_PARALLEL_AGENTS: &str = "BUILDFLOW_MAX_PARALLEL_AGENTS";

const DEFAULT_MANIFEST_PATH: &str = "orchestration/components.json";
const DEFAULT_COMPONENTS_DIR: &str = "components";
const DEFAULT_CONTRACTS_DIR: &str = "contracts";
const DEFAULT_REPORT_PATH: &str = "orchestration/run-report.json";
const DEFAULT_WORKER_COMMAND: &str = "cargo build --quiet --manifest-path {component_dir}/Cargo.toml";
const DEFAULT_MIN_COVERAGE_PCT: f64 = 80.0;

/// Acceptance thresholds applied at Verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityThresholds {
    /// Minimum line coverage percentage.
    pub min_coverage_pct: f64,
    /// Lint must report no errors.
    pub require_lint: bool,
    /// Formatting must be compliant.
    pub require_fmt: bool,
    /// Public API docs must be complete.
    pub require_docs: bool,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            min_coverage_pct: DEFAULT_MIN_COVERAGE_PCT,
            require_lint: true,
            require_fmt: true,
            require_docs: true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    orchestration: Option<RawOrchestration>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawOrchestration {
    max_parallel_agents: Option<i64>,
    component_timeout_secs: Option<f64>,
    manifest_path: Option<PathBuf>,
    spec_path: Option<PathBuf>,
    components_dir: Option<PathBuf>,
    contracts_dir: Option<PathBuf>,
    report_path: Option<PathBuf>,
    worker_command: Option<String>,
    integration_command: Option<String>,
    quality_command: Option<String>,
    retry: RetryConfig,
    quality: QualityThresholds,
}

/// Validated orchestration settings.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestrationConfig {
    /// Maximum concurrent worker executions within a level.
    pub max_parallel_agents: usize,
    /// Optional per-component build time limit.
    pub component_timeout: Option<Duration>,
    /// The component manifest read at Planning.
    pub manifest_path: PathBuf,
    /// Optional specification document that must exist at Planning.
    pub spec_path: Option<PathBuf>,
    /// Root of the per-component working areas.
    pub components_dir: PathBuf,
    /// Directory contracts are written to.
    pub contracts_dir: PathBuf,
    /// Where the run report is written.
    pub report_path: PathBuf,
    /// Worker command template.
    pub worker_command: String,
    /// Integration suite command.
    pub integration_command: Option<String>,
    /// Quality check command template.
    pub quality_command: Option<String>,
    /// Worker retry policy.
    pub retry: RetryConfig,
    /// Verification thresholds.
    pub quality: QualityThresholds,
}

fn positive_agents(value: i64) -> Result<usize, ConfigurationError> {
    if value < 1 {
        return Err(ConfigurationError::for_field(
            "max_parallel_agents",
            format!("max_parallel_agents must be a positive integer, got {value}"),
        ));
    }
    usize::try_from(value).map_err(|_| {
        ConfigurationError::for_field("max_parallel_agents", format!("{value} is out of range"))
    })
}

impl OrchestrationConfig {
    /// Creates settings with defaults for everything but the agent limit.
    ///
    /// # Errors
    ///
    /// Returns an error if `max_parallel_agents` is zero.
    pub fn new(max_parallel_agents: usize) -> Result<Self, ConfigurationError> {
        let config = Self {
            max_parallel_agents,
            component_timeout: None,
            manifest_path: PathBuf::from(DEFAULT_MANIFEST_PATH),
            spec_path: None,
            components_dir: PathBuf::from(DEFAULT_COMPONENTS_DIR),
            contracts_dir: PathBuf::from(DEFAULT_CONTRACTS_DIR),
            report_path: PathBuf::from(DEFAULT_REPORT_PATH),
            worker_command: DEFAULT_WORKER_COMMAND.to_string(),
            integration_command: None,
            quality_command: None,
            retry: RetryConfig::default(),
            quality: QualityThresholds::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Loads settings from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, malformed or invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigurationError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ConfigurationError::new(format!(
                "cannot read settings file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_json_str(&raw)
    }

    /// Parses settings from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed or invalid.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigurationError> {
        let file: ConfigFile = serde_json::from_str(raw)
            .map_err(|e| ConfigurationError::new(format!("invalid settings document: {e}")))?;
        let raw = file.orchestration.ok_or_else(|| {
            ConfigurationError::for_field("orchestration", "missing `orchestration` section")
        })?;

        let agents = raw.max_parallel_agents.ok_or_else(|| {
            ConfigurationError::for_field("max_parallel_agents", "max_parallel_agents is required")
        })?;

        let component_timeout = match raw.component_timeout_secs {
            None => None,
            Some(secs) if secs > 0.0 => Some(Duration::try_from_secs_f64(secs).map_err(|e| {
                ConfigurationError::for_field(
                    "component_timeout_secs",
                    format!("component_timeout_secs {secs} is out of range: {e}"),
                )
            })?),
            Some(secs) => {
                return Err(ConfigurationError::for_field(
                    "component_timeout_secs",
                    format!("component_timeout_secs must be positive, got {secs}"),
                ))
            }
        };

        let mut config = Self::new(positive_agents(agents)?)?;
        config.component_timeout = component_timeout;
        config.spec_path = raw.spec_path;
        config.integration_command = raw.integration_command;
        config.quality_command = raw.quality_command;
        config.retry = raw.retry;
        config.quality = raw.quality;
        if let Some(path) = raw.manifest_path {
            config.manifest_path = path;
        }
        if let Some(dir) = raw.components_dir {
            config.components_dir = dir;
        }
        if let Some(dir) = raw.contracts_dir {
            config.contracts_dir = dir;
        }
        if let Some(path) = raw.report_path {
            config.report_path = path;
        }
        if let Some(command) = raw.worker_command {
            config.worker_command = command;
        }

        config.validate()?;
        Ok(config)
    }

    /// Applies overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if an override is malformed.
    pub fn with_env_overrides(self) -> Result<Self, ConfigurationError> {
        self.with_env_overrides_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if an override is malformed.
    pub fn with_env_overrides_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigurationError> {
        if let Some(value) = lookup(ENV_MAX_PARALLEL_AGENTS) {
            let parsed = value.trim().parse::<i64>().map_err(|_| {
                ConfigurationError::for_field(
                    "max_parallel_agents",
                    format!("{ENV_MAX_PARALLEL_AGENTS} must be an integer, got '{value}'"),
                )
            })?;
            self.max_parallel_agents = positive_agents(parsed)?;
        }
        Ok(self)
    }

    /// Overrides the agent limit.
    ///
    /// # Errors
    ///
    /// Returns an error if `agents` is zero.
    pub fn with_max_parallel_agents(mut self, agents: usize) -> Result<Self, ConfigurationError> {
        self.max_parallel_agents = agents;
        self.validate()?;
        Ok(self)
    }

    /// Sets the per-component time limit.
    #[must_use]
    pub fn with_component_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.component_timeout = timeout;
        self
    }

    /// Sets the manifest path.
    #[must_use]
    pub fn with_manifest_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.manifest_path = path.into();
        self
    }

    /// Sets the specification document path.
    #[must_use]
    pub fn with_spec_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.spec_path = Some(path.into());
        self
    }

    /// Sets the report path.
    #[must_use]
    pub fn with_report_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.report_path = path.into();
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the verification thresholds.
    #[must_use]
    pub fn with_quality(mut self, quality: QualityThresholds) -> Self {
        self.quality = quality;
        self
    }

    /// Checks every setting.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.max_parallel_agents < 1 {
            return Err(ConfigurationError::for_field(
                "max_parallel_agents",
                "max_parallel_agents must be at least 1",
            ));
        }
        if self.component_timeout.is_some_and(|limit| limit.is_zero()) {
            return Err(ConfigurationError::for_field(
                "component_timeout_secs",
                "component_timeout_secs must be positive",
            ));
        }
        if !(0.0..=100.0).contains(&self.quality.min_coverage_pct) {
            return Err(ConfigurationError::for_field(
                "quality.min_coverage_pct",
                format!(
                    "min_coverage_pct must be between 0 and 100, got {}",
                    self.quality.min_coverage_pct
                ),
            ));
        }
        if self.retry.max_attempts < 1 {
            return Err(ConfigurationError::for_field(
                "retry.max_attempts",
                "retry.max_attempts must be at least 1",
            ));
        }
        if self.worker_command.trim().is_empty() {
            return Err(ConfigurationError::for_field(
                "worker_command",
                "worker_command must not be empty",
            ));
        }
        Ok(())
    }
}
