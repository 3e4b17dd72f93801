//! Phase gate predicates.

use crate::collaborators::IntegrationStats;
use crate::dispatch::LevelOutcome;
use crate::errors::PhaseFailure;
use crate::report::ComponentQuality;

/// Passes iff no component of the level failed.
///
/// # Errors
///
/// Returns `ComponentBuild` naming every failed component.
pub fn build_level_gate(outcome: &LevelOutcome) -> Result<(), PhaseFailure> {
    let failed = outcome.failed_names();
    if failed.is_empty() {
        Ok(())
    } else {
        Err(PhaseFailure::ComponentBuild {
            level: outcome.level,
            failed,
        })
    }
}

/// Passes iff every declared test ran and none failed.
///
/// An empty suite passes. Counts that contradict each other fail.
///
/// # Errors
///
/// Returns `IntegrationGate` with the offending rates.
pub fn integration_gate(stats: &IntegrationStats) -> Result<(), PhaseFailure> {
    let reason = if !stats.is_consistent() {
        format!(
            "invalid report: {} executed, {} declared, {} failed",
            stats.executed, stats.total, stats.failed
        )
    } else if stats.executed < stats.total {
        format!(
            "execution rate {:.1}%: {} of {} tests did not run",
            stats.execution_rate() * 100.0,
            stats.not_run(),
            stats.total
        )
    } else if stats.failed > 0 {
        format!(
            "pass rate {:.1}%: {} of {} tests failed",
            stats.pass_rate() * 100.0,
            stats.failed,
            stats.executed
        )
    } else {
        return Ok(());
    };

    Err(PhaseFailure::IntegrationGate {
        executed: stats.executed,
        total: stats.total,
        failed: stats.failed,
        reason,
    })
}

/// Passes iff every component passed every check.
///
/// # Errors
///
/// Returns `Verification` listing each `component: finding`.
pub fn verification_gate(results: &[ComponentQuality]) -> Result<(), PhaseFailure> {
    let findings: Vec<String> = results
        .iter()
        .flat_map(|q| q.findings.iter().map(move |f| format!("{}: {f}", q.component)))
        .collect();
    if findings.is_empty() {
        Ok(())
    } else {
        Err(PhaseFailure::Verification { findings })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ComponentResult;

    #[test]
    fn test_build_gate() {
        let ok = LevelOutcome {
            level: 0,
            results: vec![ComponentResult::succeeded("cdp_types")],
            interrupted: false,
        };
        assert!(build_level_gate(&ok).is_ok());

        let bad = LevelOutcome {
            level: 2,
            results: vec![
                ComponentResult::succeeded("dom_domain"),
                ComponentResult::failed("network_domain", "x"),
                ComponentResult::failed("console_storage", "y"),
            ],
            interrupted: false,
        };
        assert_eq!(
            build_level_gate(&bad).unwrap_err(),
            PhaseFailure::ComponentBuild {
                level: 2,
                failed: vec!["network_domain".to_string(), "console_storage".to_string()],
            }
        );
    }

    #[test]
    fn test_integration_gate_requires_full_execution() {
        let err = integration_gate(&IntegrationStats::new(8, 10, 0)).unwrap_err();
        match err {
            PhaseFailure::IntegrationGate { reason, .. } => {
                assert!(reason.contains("80.0%"));
                assert!(reason.contains("2 of 10"));
            }
            other => panic!("unexpected failure: {other:?}"),
        }
    }

    #[test]
    fn test_integration_gate_requires_full_pass() {
        assert!(integration_gate(&IntegrationStats::new(10, 10, 1)).is_err());
        assert!(integration_gate(&IntegrationStats::new(10, 10, 0)).is_ok());
    }

    #[test]
    fn test_integration_gate_edge_counts() {
        assert!(integration_gate(&IntegrationStats::new(0, 0, 0)).is_ok());
        let err = integration_gate(&IntegrationStats::new(12, 10, 0)).unwrap_err();
        assert!(err.to_string().contains("invalid report"));
    }

    #[test]
    fn test_verification_gate_lists_all_findings() {
        let results = vec![
            ComponentQuality {
                component: "a".to_string(),
                report: None,
                findings: vec!["coverage 70.0% below 80.0%".to_string()],
            },
            ComponentQuality {
                component: "b".to_string(),
                report: None,
                findings: Vec::new(),
            },
            ComponentQuality {
                component: "c".to_string(),
                report: None,
                findings: vec!["lint errors".to_string()],
            },
        ];

        match verification_gate(&results).unwrap_err() {
            PhaseFailure::Verification { findings } => {
                assert_eq!(findings, vec!["a: coverage 70.0% below 80.0%", "c: lint errors"]);
            }
            other => panic!("unexpected failure: {other:?}"),
        }
        assert!(verification_gate(&results[1..2]).is_ok());
    }
}
