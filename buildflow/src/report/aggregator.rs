//! Outcome aggregator: the only writer of the run report.

use super::{ComponentQuality, PhaseRecord, RunReport};
use crate::collaborators::IntegrationStats;
use crate::core::{ComponentResult, PhaseOutcome, RunStatus};
use crate::dispatch::LevelOutcome;
use crate::errors::PhaseFailure;
use crate::graph::BuildOrder;
use crate::pipeline::{Phase, EXIT_ABORTED, EXIT_SUCCESS};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::debug;

/// Accumulates phase and component outcomes into a [`RunReport`].
///
/// The first failure or abort freezes the report: its status, first
/// failing phase and exit code never change afterwards, and later
/// mutations are ignored.
#[derive(Debug)]
pub struct OutcomeAggregator {
    report: Mutex<RunReport>,
}

impl OutcomeAggregator {
    /// Starts a new report.
    #[must_use]
    pub fn new(max_parallel_agents: usize) -> Self {
        Self {
            report: Mutex::new(RunReport::new(max_parallel_agents)),
        }
    }

    /// Returns true once the report can no longer change.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.report.lock().status.is_terminal()
    }

    /// Records the project name and build order computed at Planning.
    pub fn record_plan(&self, project: Option<String>, build_order: BuildOrder) {
        let mut report = self.report.lock();
        if report.status.is_terminal() {
            return;
        }
        report.project = project;
        report.build_order = build_order;
    }

    /// Records a passed gate.
    pub fn record_phase_passed(&self, phase: Phase, started_at: DateTime<Utc>, duration_ms: f64) {
        let mut report = self.report.lock();
        if report.status.is_terminal() {
            return;
        }
        report.phases.push(PhaseRecord {
            phase,
            outcome: PhaseOutcome::Passed,
            started_at,
            duration_ms,
            failure: None,
        });
    }

    /// Records a failed gate and freezes the report.
    pub fn record_phase_failed(
        &self,
        phase: Phase,
        started_at: DateTime<Utc>,
        duration_ms: f64,
        failure: PhaseFailure,
    ) {
        let mut report = self.report.lock();
        if report.status.is_terminal() {
            debug!(phase = %phase, "Report already frozen, ignoring failure");
            return;
        }
        report.phases.push(PhaseRecord {
            phase,
            outcome: PhaseOutcome::Failed,
            started_at,
            duration_ms,
            failure: Some(failure),
        });
        report.status = RunStatus::Failed;
        report.first_failing_phase = Some(phase);
        report.exit_code = phase.exit_code();
    }

    /// Records a phase interrupted by cancellation and freezes the report.
    pub fn record_phase_aborted(
        &self,
        phase: Phase,
        started_at: DateTime<Utc>,
        duration_ms: f64,
        reason: impl Into<String>,
    ) {
        let mut report = self.report.lock();
        if report.status.is_terminal() {
            return;
        }
        report.phases.push(PhaseRecord {
            phase,
            outcome: PhaseOutcome::Aborted,
            started_at,
            duration_ms,
            failure: None,
        });
        report.status = RunStatus::Aborted;
        report.exit_code = EXIT_ABORTED;
        report.abort_reason = Some(reason.into());
    }

    /// Merges the results of one build level.
    pub fn record_level(&self, outcome: &LevelOutcome) {
        let mut report = self.report.lock();
        if report.status.is_terminal() {
            return;
        }
        for result in &outcome.results {
            merge_result(&mut report.components, result.clone());
        }
    }

    /// Records integration counts.
    pub fn record_integration(&self, stats: IntegrationStats) {
        let mut report = self.report.lock();
        if report.status.is_terminal() {
            return;
        }
        report.integration = Some(stats);
    }

    /// Records one component's verification outcome.
    pub fn record_quality(&self, quality: ComponentQuality) {
        let mut report = self.report.lock();
        if report.status.is_terminal() {
            return;
        }
        report.quality.push(quality);
    }

    /// Returns a copy of the report as it stands.
    #[must_use]
    pub fn snapshot(&self) -> RunReport {
        self.report.lock().clone()
    }

    /// Finalizes the report. A report that never failed or aborted is a
    /// success with exit code 0.
    #[must_use]
    pub fn finalize(&self) -> RunReport {
        let mut report = self.report.lock();
        if report.status == RunStatus::Running {
            report.status = RunStatus::Succeeded;
            report.exit_code = EXIT_SUCCESS;
        }
        if report.finished_at.is_none() {
            report.finished_at = Some(Utc::now());
        }
        report.clone()
    }
}

fn merge_result(results: &mut Vec<ComponentResult>, result: ComponentResult) {
    match results.iter_mut().find(|r| r.component == result.component) {
        Some(existing) => *existing = result,
        None => results.push(result),
    }
}
