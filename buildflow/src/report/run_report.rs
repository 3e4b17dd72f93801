//! The run report: the single record of what a run did.

use crate::collaborators::{IntegrationStats, QualityReport};
use crate::core::{ComponentResult, PhaseOutcome, RunStatus};
use crate::errors::{BuildflowError, PhaseFailure};
use crate::graph::BuildOrder;
use crate::pipeline::Phase;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

/// How one phase ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseRecord {
    /// The phase.
    pub phase: Phase,
    /// Gate verdict.
    pub outcome: PhaseOutcome,
    /// When the phase was entered.
    pub started_at: DateTime<Utc>,
    /// Time spent in the phase.
    pub duration_ms: f64,
    /// Why the gate failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<PhaseFailure>,
}

/// Verification measurements for one component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentQuality {
    /// The component.
    pub component: String,
    /// The checker's measurements, absent if the checker errored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<QualityReport>,
    /// Failing checks. Empty when the component passed.
    #[serde(default)]
    pub findings: Vec<String>,
}

impl ComponentQuality {
    /// Returns true if every check passed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.findings.is_empty()
    }
}

/// Final, serializable record of an orchestration run.
///
/// `exit_code` is meaningful once `status` is terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Unique run identifier.
    pub run_id: Uuid,
    /// Project name from the manifest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    /// Overall status.
    pub status: RunStatus,
    /// The first phase whose gate failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_failing_phase: Option<Phase>,
    /// Process exit code.
    pub exit_code: i32,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run was finalized.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Concurrency limit used for Build.
    pub max_parallel_agents: usize,
    /// The level-ordered build plan.
    #[serde(default)]
    pub build_order: BuildOrder,
    /// One record per phase entered, in order.
    #[serde(default)]
    pub phases: Vec<PhaseRecord>,
    /// Build results for every dispatched component.
    #[serde(default)]
    pub components: Vec<ComponentResult>,
    /// Integration counts, if Integration ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integration: Option<IntegrationStats>,
    /// Verification results, if Verification ran.
    #[serde(default)]
    pub quality: Vec<ComponentQuality>,
    /// Cancellation reason for aborted runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abort_reason: Option<String>,
}

impl RunReport {
    /// Creates a report for a run that is starting now.
    #[must_use]
    pub fn new(max_parallel_agents: usize) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            project: None,
            status: RunStatus::Running,
            first_failing_phase: None,
            exit_code: 0,
            started_at: Utc::now(),
            finished_at: None,
            max_parallel_agents,
            build_order: BuildOrder::default(),
            phases: Vec::new(),
            components: Vec::new(),
            integration: None,
            quality: Vec::new(),
            abort_reason: None,
        }
    }

    /// Returns true if the run succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Succeeded
    }

    /// Returns the record of a phase, if it was entered.
    #[must_use]
    pub fn phase(&self, phase: Phase) -> Option<&PhaseRecord> {
        self.phases.iter().find(|r| r.phase == phase)
    }

    /// Returns the Build result of a component.
    #[must_use]
    pub fn component(&self, name: &str) -> Option<&ComponentResult> {
        self.components.iter().find(|r| r.component == name)
    }

    /// Names of components whose build failed.
    #[must_use]
    pub fn failed_components(&self) -> Vec<&str> {
        self.components
            .iter()
            .filter(|r| r.is_failure())
            .map(|r| r.component.as_str())
            .collect()
    }

    /// The failure recorded for the first failing phase.
    #[must_use]
    pub fn failure(&self) -> Option<&PhaseFailure> {
        self.phases.iter().find_map(|r| r.failure.as_ref())
    }

    /// Total run time, once finalized.
    #[must_use]
    pub fn duration_ms(&self) -> Option<i64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }

    /// One-line human summary.
    #[must_use]
    pub fn summary(&self) -> String {
        let built = self.components.iter().filter(|r| r.is_success()).count();
        let mut line = format!(
            "run {} {} (exit {}): {}/{} components built",
            self.run_id,
            self.status,
            self.exit_code,
            built,
            self.build_order.component_count()
        );
        if let Some(phase) = self.first_failing_phase {
            line.push_str(&format!(", first failing phase: {phase}"));
        }
        if let Some(reason) = &self.abort_reason {
            line.push_str(&format!(", aborted: {reason}"));
        }
        line
    }

    /// Writes the report as pretty JSON, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_to(&self, path: &Path) -> Result<(), BuildflowError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_string_pretty(self)?;
        std::fs::write(path, body)?;
        Ok(())
    }

    /// Reads a report previously written with [`write_to`](Self::write_to).
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or malformed.
    pub fn read_from(path: &Path) -> Result<Self, BuildflowError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_report_is_running() {
        let report = RunReport::new(3);
        assert_eq!(report.status, RunStatus::Running);
        assert!(!report.status.is_terminal());
        assert_eq!(report.max_parallel_agents, 3);
        assert!(report.duration_ms().is_none());
    }

    #[test]
    fn test_component_lookup() {
        let mut report = RunReport::new(1);
        report.components = vec![
            ComponentResult::succeeded("cdp_types"),
            ComponentResult::failed("cdp_server", "linker error"),
        ];

        assert!(report.component("cdp_types").unwrap().is_success());
        assert_eq!(report.failed_components(), vec!["cdp_server"]);
        assert!(report.component("missing").is_none());
    }

    #[test]
    fn test_report_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/run-report.json");
        let mut report = RunReport::new(2);
        report.status = RunStatus::Failed;
        report.exit_code = 5;
        report.first_failing_phase = Some(Phase::Integration);
        report.integration = Some(IntegrationStats::new(8, 10, 0));
        report.finished_at = Some(Utc::now());

        report.write_to(&path).unwrap();
        let loaded = RunReport::read_from(&path).unwrap();

        assert_eq!(loaded, report);
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["first_failing_phase"], "integration");
    }

    #[test]
    fn test_summary_mentions_failure() {
        let mut report = RunReport::new(2);
        report.status = RunStatus::Failed;
        report.exit_code = 3;
        report.first_failing_phase = Some(Phase::Build);

        let summary = report.summary();
        assert!(summary.contains("exit 3"));
        assert!(summary.contains("first failing phase: build"));
    }
}
