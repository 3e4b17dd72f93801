//! Assertions over run reports.

use crate::core::{ComponentStatus, RunStatus};
use crate::pipeline::Phase;
use crate::report::RunReport;

/// Asserts that the run succeeded with exit code 0.
pub fn assert_run_succeeded(report: &RunReport) {
    assert_eq!(
        report.status,
        RunStatus::Succeeded,
        "Expected success, got {} (failure: {:?})",
        report.status,
        report.failure()
    );
    assert_eq!(report.exit_code, 0, "Expected exit code 0");
}

/// Asserts that `phase` was the first to fail and set the exit code.
pub fn assert_failed_at(report: &RunReport, phase: Phase) {
    assert_eq!(
        report.first_failing_phase,
        Some(phase),
        "Expected first failing phase {phase}, got {:?}",
        report.first_failing_phase
    );
    assert_eq!(
        report.exit_code,
        phase.exit_code(),
        "Expected exit code {} for {phase}",
        phase.exit_code()
    );
}

/// Asserts a component's Build status.
pub fn assert_component_status(report: &RunReport, component: &str, expected: ComponentStatus) {
    let actual = report.component(component).map(|r| r.status);
    assert_eq!(
        actual,
        Some(expected),
        "Expected '{component}' to be {expected}, got {actual:?}"
    );
}

/// Asserts that no phase after `last` was entered.
pub fn assert_no_phase_after(report: &RunReport, last: Phase) {
    let later: Vec<Phase> = report
        .phases
        .iter()
        .map(|r| r.phase)
        .filter(|p| *p > last)
        .collect();
    assert!(later.is_empty(), "Expected no phase after {last}, found {later:?}");
}
