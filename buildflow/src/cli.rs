//! Command-line interface for the `buildflow` binary.

use crate::config::{OrchestrationConfig, DEFAULT_CONFIG_PATH};
use crate::errors::ConfigurationError;
use crate::observability::{parse_level, LoggingConfig};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// Dependency-leveled phase scheduler for multi-component builds
#[derive(Parser, Debug)]
#[command(
    name = "buildflow",
    about = "Dependency-leveled phase scheduler for multi-component builds",
    version,
    long_about = "buildflow reads a component manifest, groups components into dependency \
                  levels and drives them through Planning, Scaffolding, ContractGeneration, \
                  Build, Integration and Verification. The exit code names the first phase \
                  that failed (0 on success, 130 when interrupted).\n\n\
                  Examples:\n  \
                  buildflow\n  \
                  buildflow --config orchestration/orchestration-config.json\n  \
                  buildflow --max-parallel-agents 4 --json-logs"
)]
pub struct CliArgs {
    #[arg(
        short = 'c',
        long,
        value_name = "FILE",
        default_value = DEFAULT_CONFIG_PATH,
        help = "Orchestration settings file"
    )]
    pub config: PathBuf,

    #[arg(long, value_name = "FILE", help = "Override the component manifest path")]
    pub manifest: Option<PathBuf>,

    #[arg(
        short = 'j',
        long,
        value_name = "N",
        help = "Override the maximum number of concurrent workers"
    )]
    pub max_parallel_agents: Option<usize>,

    #[arg(long, value_name = "SECONDS", help = "Per-component build time limit")]
    pub component_timeout: Option<u64>,

    #[arg(long, value_name = "FILE", help = "Where to write the run report")]
    pub report: Option<PathBuf>,

    #[arg(long, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,

    #[arg(short = 'v', long, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        conflicts_with = "verbose",
        help = "Quiet mode - only errors are logged"
    )]
    pub quiet: bool,
}

impl CliArgs {
    /// Resolves logging settings: `--log-level`, then `-v`/`-q`, then the environment.
    #[must_use]
    pub fn logging_config(&self) -> LoggingConfig {
        let from_env = LoggingConfig::from_env();
        let level = if let Some(level) = self.log_level.as_deref().and_then(parse_level) {
            level
        } else if self.verbose {
            Level::DEBUG
        } else if self.quiet {
            Level::ERROR
        } else {
            from_env.level
        };
        LoggingConfig::with_level(level).json(self.json_logs || from_env.use_json)
    }

    /// Loads the settings file, then applies environment and flag overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or invalid, or an override
    /// is out of range.
    pub fn resolve_config(&self) -> Result<OrchestrationConfig, ConfigurationError> {
        let config = OrchestrationConfig::load(&self.config)?.with_env_overrides()?;
        self.apply_overrides(config)
    }

    /// Applies command-line overrides on top of loaded settings.
    ///
    /// # Errors
    ///
    /// Returns an error if `--max-parallel-agents` or `--component-timeout`
    /// is zero.
    pub fn apply_overrides(
        &self,
        mut config: OrchestrationConfig,
    ) -> Result<OrchestrationConfig, ConfigurationError> {
        if let Some(agents) = self.max_parallel_agents {
            config = config.with_max_parallel_agents(agents)?;
        }
        if let Some(secs) = self.component_timeout {
            config = config.with_component_timeout(Some(Duration::from_secs(secs)));
        }
        if let Some(manifest) = &self.manifest {
            config = config.with_manifest_path(manifest.clone());
        }
        if let Some(report) = &self.report {
            config = config.with_report_path(report.clone());
        }
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = CliArgs::try_parse_from(["buildflow"]).unwrap();
        assert_eq!(args.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert!(args.max_parallel_agents.is_none());
        assert!(!args.json_logs);
    }

    #[test]
    fn test_verbose_and_quiet_conflict() {
        assert!(CliArgs::try_parse_from(["buildflow", "-v", "-q"]).is_err());
    }

    #[test]
    fn test_log_level_wins_over_verbose() {
        let args = CliArgs::try_parse_from(["buildflow", "-v", "--log-level", "warn"]).unwrap();
        assert_eq!(args.logging_config().level, Level::WARN);

        let args = CliArgs::try_parse_from(["buildflow", "-q"]).unwrap();
        assert_eq!(args.logging_config().level, Level::ERROR);
    }

    #[test]
    fn test_overrides_applied() {
        let args = CliArgs::try_parse_from([
            "buildflow",
            "-j",
            "6",
            "--component-timeout",
            "30",
            "--manifest",
            "plan/components.json",
            "--report",
            "out/report.json",
        ])
        .unwrap();

        let config = args
            .apply_overrides(OrchestrationConfig::new(2).unwrap())
            .unwrap();

        assert_eq!(config.max_parallel_agents, 6);
        assert_eq!(config.component_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.manifest_path, PathBuf::from("plan/components.json"));
        assert_eq!(config.report_path, PathBuf::from("out/report.json"));
    }

    #[test]
    fn test_zero_agents_rejected() {
        let args = CliArgs::try_parse_from(["buildflow", "--max-parallel-agents", "0"]).unwrap();
        assert!(args
            .apply_overrides(OrchestrationConfig::new(2).unwrap())
            .is_err());
    }

    #[test]
    fn test_zero_component_timeout_rejected() {
        let args = CliArgs::try_parse_from(["buildflow", "--component-timeout", "0"]).unwrap();
        let err = args
            .apply_overrides(OrchestrationConfig::new(2).unwrap())
            .unwrap_err();
        assert_eq!(err.field.as_deref(), Some("component_timeout_secs"));
    }

    #[test]
    fn test_missing_config_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let args =
            CliArgs::try_parse_from(["buildflow", "--config", path.to_str().unwrap()]).unwrap();
        assert!(args.resolve_config().is_err());
    }
}
