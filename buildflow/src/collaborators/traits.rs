//! Contracts for the external collaborators the pipeline drives.

use crate::cancellation::CancellationToken;
use super::{
    CommandIntegrationRunner, CommandQualityChecker, CommandWorker, FsScaffolder,
    JsonContractGenerator, RetryingWorker,
};
use crate::config::{OrchestrationConfig, QualityThresholds};
use crate::core::ComponentResult;
use crate::errors::CollaboratorError;
use crate::graph::Component;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// Materializes a component's working area. Must be idempotent.
#[async_trait]
pub trait Scaffolder: Send + Sync {
    /// Scaffolds one component.
    async fn scaffold(&self, component: &Component) -> Result<(), CollaboratorError>;
}

/// Produces a component's declared interface surface.
#[async_trait]
pub trait ContractGenerator: Send + Sync {
    /// Generates the contract for one component.
    async fn generate(&self, component: &Component) -> Result<(), CollaboratorError>;
}

/// Performs the implementation work for one component.
///
/// Called concurrently for components of the same level. Implementations
/// should return promptly once `cancel` fires.
#[async_trait]
pub trait Worker: Send + Sync {
    /// Builds one component.
    async fn build(
        &self,
        component: &Component,
        cancel: &CancellationToken,
    ) -> Result<ComponentResult, CollaboratorError>;
}

/// Runs the cross-component test suite.
#[async_trait]
pub trait IntegrationTestRunner: Send + Sync {
    /// Runs every declared integration test.
    async fn run(&self) -> Result<IntegrationStats, CollaboratorError>;
}

/// Runs final acceptance checks on one component.
#[async_trait]
pub trait QualityChecker: Send + Sync {
    /// Checks one component.
    async fn check(&self, component: &Component) -> Result<QualityReport, CollaboratorError>;
}

/// Counts reported by an integration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IntegrationStats {
    /// Tests that actually ran.
    pub executed: u64,
    /// Tests declared.
    pub total: u64,
    /// Tests that ran and failed.
    pub failed: u64,
}

impl IntegrationStats {
    /// Creates integration stats.
    #[must_use]
    pub fn new(executed: u64, total: u64, failed: u64) -> Self {
        Self {
            executed,
            total,
            failed,
        }
    }

    /// Declared tests that never ran.
    #[must_use]
    pub fn not_run(&self) -> u64 {
        self.total.saturating_sub(self.executed)
    }

    /// Fraction of declared tests that ran. 1.0 when nothing is declared.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn execution_rate(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.executed as f64 / self.total as f64
    }

    /// Fraction of executed tests that passed. 1.0 when nothing ran.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn pass_rate(&self) -> f64 {
        if self.executed == 0 {
            return 1.0;
        }
        self.executed.saturating_sub(self.failed) as f64 / self.executed as f64
    }

    /// False when the counts contradict each other.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.executed <= self.total && self.failed <= self.executed
    }
}

/// Acceptance measurements for one component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    /// Line coverage percentage, 0-100.
    pub coverage_pct: f64,
    /// Linter reported no errors.
    pub lint_ok: bool,
    /// Formatter reported no changes.
    pub fmt_ok: bool,
    /// Public API documentation is complete.
    pub docs_ok: bool,
}

impl QualityReport {
    /// A report with every check passing at the given coverage.
    #[must_use]
    pub fn passing(coverage_pct: f64) -> Self {
        Self {
            coverage_pct,
            lint_ok: true,
            fmt_ok: true,
            docs_ok: true,
        }
    }

    /// Lists every failing check against the thresholds.
    #[must_use]
    pub fn findings(&self, thresholds: &QualityThresholds) -> Vec<String> {
        let mut findings = Vec::new();
        if self.coverage_pct < thresholds.min_coverage_pct {
            findings.push(format!(
                "coverage {:.1}% below {:.1}%",
                self.coverage_pct, thresholds.min_coverage_pct
            ));
        }
        if thresholds.require_lint && !self.lint_ok {
            findings.push("lint errors".to_string());
        }
        if thresholds.require_fmt && !self.fmt_ok {
            findings.push("formatting not compliant".to_string());
        }
        if thresholds.require_docs && !self.docs_ok {
            findings.push("documentation incomplete".to_string());
        }
        findings
    }
}

/// The full set of collaborators a pipeline run uses.
#[derive(Clone)]
pub struct Collaborators {
    /// Scaffold collaborator.
    pub scaffolder: Arc<dyn Scaffolder>,
    /// Contract collaborator.
    pub contracts: Arc<dyn ContractGenerator>,
    /// Build worker.
    pub worker: Arc<dyn Worker>,
    /// Integration test runner.
    pub integration: Arc<dyn IntegrationTestRunner>,
    /// Quality checker.
    pub quality: Arc<dyn QualityChecker>,
}

impl Collaborators {
    /// Bundles collaborators.
    #[must_use]
    pub fn new(
        scaffolder: Arc<dyn Scaffolder>,
        contracts: Arc<dyn ContractGenerator>,
        worker: Arc<dyn Worker>,
        integration: Arc<dyn IntegrationTestRunner>,
        quality: Arc<dyn QualityChecker>,
    ) -> Self {
        Self {
            scaffolder,
            contracts,
            worker,
            integration,
            quality,
        }
    }

    /// Builds the filesystem and shell-command collaborators described by
    /// the settings. The worker is wrapped in a [`RetryingWorker`] when
    /// retries are enabled.
    ///
    /// Without an `integration_command` the suite is empty, and without a
    /// `quality_command` Verification checks are skipped. Both are logged.
    #[must_use]
    pub fn from_config(config: &OrchestrationConfig) -> Self {
        let mut worker: Arc<dyn Worker> = Arc::new(CommandWorker::new(
            config.worker_command.clone(),
            config.components_dir.clone(),
        ));
        if config.retry.is_enabled() {
            worker = Arc::new(RetryingWorker::new(worker, config.retry.clone()));
        }

        let integration: Arc<dyn IntegrationTestRunner> = match &config.integration_command {
            Some(command) => Arc::new(CommandIntegrationRunner::new(command.clone())),
            None => {
                warn!("No integration_command configured, integration suite is empty");
                Arc::new(EmptyIntegrationSuite)
            }
        };
        let quality: Arc<dyn QualityChecker> = match &config.quality_command {
            Some(template) => Arc::new(CommandQualityChecker::new(
                template.clone(),
                config.components_dir.clone(),
            )),
            None => {
                warn!("No quality_command configured, verification checks are skipped");
                Arc::new(SkippedQualityChecks)
            }
        };

        Self::new(
            Arc::new(FsScaffolder::new(config.components_dir.clone())),
            Arc::new(JsonContractGenerator::new(config.contracts_dir.clone())),
            worker,
            integration,
            quality,
        )
    }

    /// Replaces the worker, e.g. to wrap it in a retrying decorator.
    #[must_use]
    pub fn with_worker(mut self, worker: Arc<dyn Worker>) -> Self {
        self.worker = worker;
        self
    }
}

/// Integration runner used when no suite is configured: declares zero tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyIntegrationSuite;

#[async_trait]
impl IntegrationTestRunner for EmptyIntegrationSuite {
    async fn run(&self) -> Result<IntegrationStats, CollaboratorError> {
        Ok(IntegrationStats::default())
    }
}

/// Quality checker used when no checks are configured: every check passes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkippedQualityChecks;

#[async_trait]
impl QualityChecker for SkippedQualityChecks {
    async fn check(&self, _component: &Component) -> Result<QualityReport, CollaboratorError> {
        Ok(QualityReport::passing(100.0))
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integration_rates() {
        let stats = IntegrationStats::new(8, 10, 0);
        assert_eq!(stats.not_run(), 2);
        assert!((stats.execution_rate() - 0.8).abs() < 1e-9);
        assert!((stats.pass_rate() - 1.0).abs() < 1e-9);

        let empty = IntegrationStats::default();
        assert!((empty.execution_rate() - 1.0).abs() < 1e-9);
        assert!(empty.is_consistent());
    }

    #[test]
    fn test_integration_inconsistent_counts() {
        assert!(!IntegrationStats::new(11, 10, 0).is_consistent());
        assert!(!IntegrationStats::new(3, 10, 4).is_consistent());
    }

    #[tokio::test]
    async fn test_from_config_minimal_settings() {
        let raw = r#"{"orchestration": {"max_parallel_agents": 3}}"#;
        let config = OrchestrationConfig::from_json_str(raw).unwrap();

        let collaborators = Collaborators::from_config(&config);

        let stats = collaborators.integration.run().await.unwrap();
        assert_eq!(stats, IntegrationStats::default());
        let component = Component::new("cdp_types", crate::core::ComponentCategory::Base);
        let report = collaborators.quality.check(&component).await.unwrap();
        assert!(report.findings(&config.quality).is_empty());
    }

    #[test]
    fn test_from_config_with_commands() {
        let mut config = OrchestrationConfig::new(2).unwrap();
        config.integration_command = Some("true".to_string());
        config.quality_command = Some("true".to_string());
        let collaborators = Collaborators::from_config(&config);
        assert!(format!("{collaborators:?}").starts_with("Collaborators"));
    }

    #[test]
    fn test_quality_findings() {
        let thresholds = QualityThresholds::default();
        assert!(QualityReport::passing(95.0).findings(&thresholds).is_empty());

        let report = QualityReport {
            coverage_pct: 61.0,
            lint_ok: false,
            fmt_ok: true,
            docs_ok: false,
        };
        let findings = report.findings(&thresholds);
        assert_eq!(findings.len(), 3);
        assert!(findings[0].contains("61.0%"));
    }
}
