//! The phase pipeline state machine.

use super::gates::{build_level_gate, integration_gate, verification_gate};
use super::Phase;
use crate::cancellation::CancellationToken;
use crate::collaborators::Collaborators;
use crate::config::OrchestrationConfig;
use crate::errors::{CollaboratorError, GraphError, ManifestError, PhaseFailure};
use crate::events::{
    EventSink, LoggingEventSink, LEVEL_COMPLETED, LEVEL_STARTED, PHASE_ABORTED, PHASE_COMPLETED,
    PHASE_FAILED, PHASE_STARTED, RUN_COMPLETED,
};
use crate::dispatch::BoundedDispatcher;
use crate::graph::{BuildOrder, Component, ComponentGraph, ComponentManifest};
use crate::report::{ComponentQuality, OutcomeAggregator, RunReport};
use chrono::Utc;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Where the component set comes from.
#[derive(Debug, Clone)]
pub enum PlanSource {
    /// A manifest file, read and validated during Planning.
    ManifestFile(PathBuf),
    /// An in-memory manifest.
    Manifest(ComponentManifest),
}

/// Why a phase stopped the run.
#[derive(Debug)]
enum PhaseHalt {
    Failed(PhaseFailure),
    Aborted(String),
}

/// Output of Planning.
#[derive(Debug)]
struct Plan {
    graph: ComponentGraph,
    build_order: BuildOrder,
}

/// Drives a run through Planning, Scaffolding, ContractGeneration, Build,
/// Integration and Verification.
///
/// Every phase is entered at most once, in order. The first failed gate or
/// a cancellation ends the run; the returned report says which.
pub struct PhasePipeline {
    config: OrchestrationConfig,
    collaborators: Collaborators,
    events: Arc<dyn EventSink>,
    cancel: Arc<CancellationToken>,
}

impl PhasePipeline {
    /// Creates a pipeline.
    #[must_use]
    pub fn new(config: OrchestrationConfig, collaborators: Collaborators) -> Self {
        Self {
            config,
            collaborators,
            events: Arc::new(LoggingEventSink::debug()),
            cancel: Arc::new(CancellationToken::new()),
        }
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Uses an externally owned cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: Arc<CancellationToken>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Returns the token that cancels this pipeline's runs.
    #[must_use]
    pub fn cancellation_token(&self) -> Arc<CancellationToken> {
        self.cancel.clone()
    }

    /// Returns the settings.
    #[must_use]
    pub fn config(&self) -> &OrchestrationConfig {
        &self.config
    }

    /// Runs every phase and returns the finalized report.
    ///
    /// Never fails: every outcome, including cancellation, is a report.
    pub async fn run(&self, source: PlanSource) -> RunReport {
        let aggregator = OutcomeAggregator::new(self.config.max_parallel_agents);
        let run_id = aggregator.snapshot().run_id;
        let span = info_span!("run", run_id = %run_id);

        async {
            info!(
                max_parallel_agents = self.config.max_parallel_agents,
                "Starting orchestration run"
            );
            if self.run_phases(&aggregator, source).await.is_none() {
                debug!("Run halted before Verification completed");
            }

            let report = aggregator.finalize();
            info!(
                status = %report.status,
                exit_code = report.exit_code,
                "{}",
                report.summary()
            );
            self.events
                .emit(
                    RUN_COMPLETED,
                    Some(serde_json::json!({
                        "run_id": report.run_id,
                        "status": report.status,
                        "exit_code": report.exit_code,
                        "first_failing_phase": report.first_failing_phase,
                    })),
                )
                .await;
            report
        }
        .instrument(span)
        .await
    }

    async fn run_phases(&self, aggregator: &OutcomeAggregator, source: PlanSource) -> Option<()> {
        let plan = self
            .run_phase(aggregator, Phase::Planning, self.plan(aggregator, source))
            .await?;
        self.run_phase(aggregator, Phase::Scaffolding, self.scaffold_all(&plan))
            .await?;
        self.run_phase(
            aggregator,
            Phase::ContractGeneration,
            self.generate_contracts(&plan),
        )
        .await?;
        self.run_phase(aggregator, Phase::Build, self.build_levels(&plan, aggregator))
            .await?;
        self.run_phase(aggregator, Phase::Integration, self.integrate(aggregator))
            .await?;
        self.run_phase(aggregator, Phase::Verification, self.verify(&plan, aggregator))
            .await
    }

    /// Enters a phase, runs its action and records the gate verdict.
    async fn run_phase<T>(
        &self,
        aggregator: &OutcomeAggregator,
        phase: Phase,
        action: impl Future<Output = Result<T, PhaseHalt>>,
    ) -> Option<T> {
        let started_at = Utc::now();
        let start = Instant::now();

        if self.cancel.is_cancelled() {
            let reason = self.cancel.reason_or_default();
            warn!(phase = %phase, reason = %reason, "Run cancelled before phase");
            aggregator.record_phase_aborted(phase, started_at, 0.0, &reason);
            self.emit_phase(PHASE_ABORTED, phase, Some(&reason)).await;
            return None;
        }

        info!(phase = %phase, "Entering phase");
        self.emit_phase(PHASE_STARTED, phase, None).await;

        let outcome = action.await;
        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

        match outcome {
            Ok(value) => {
                info!(phase = %phase, duration_ms, "Phase gate passed");
                aggregator.record_phase_passed(phase, started_at, duration_ms);
                self.emit_phase(PHASE_COMPLETED, phase, None).await;
                Some(value)
            }
            Err(PhaseHalt::Failed(failure)) => {
                error!(
                    phase = %phase,
                    exit_code = phase.exit_code(),
                    error = %failure,
                    "Phase gate failed"
                );
                let message = failure.to_string();
                aggregator.record_phase_failed(phase, started_at, duration_ms, failure);
                self.emit_phase(PHASE_FAILED, phase, Some(&message)).await;
                None
            }
            Err(PhaseHalt::Aborted(reason)) => {
                warn!(phase = %phase, reason = %reason, "Phase aborted");
                aggregator.record_phase_aborted(phase, started_at, duration_ms, &reason);
                self.emit_phase(PHASE_ABORTED, phase, Some(&reason)).await;
                None
            }
        }
    }

    async fn emit_phase(&self, event_type: &str, phase: Phase, detail: Option<&str>) {
        self.events
            .emit(
                event_type,
                Some(serde_json::json!({ "phase": phase, "detail": detail })),
            )
            .await;
    }

    /// Races a collaborator call against cancellation.
    async fn cancellable<T>(&self, call: impl Future<Output = T>) -> Result<T, PhaseHalt> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(PhaseHalt::Aborted(self.cancel.reason_or_default())),
            value = call => Ok(value),
        }
    }

    /// Maps a collaborator error to a halt. Errors raised because the run
    /// was cancelled abort instead of failing the gate.
    fn collaborator_halt(
        &self,
        err: &CollaboratorError,
        failure: impl FnOnce(String) -> PhaseFailure,
    ) -> PhaseHalt {
        if matches!(err, CollaboratorError::Cancelled(_)) || self.cancel.is_cancelled() {
            PhaseHalt::Aborted(self.cancel.reason_or_default())
        } else {
            PhaseHalt::Failed(failure(err.to_string()))
        }
    }

    async fn plan(
        &self,
        aggregator: &OutcomeAggregator,
        source: PlanSource,
    ) -> Result<Plan, PhaseHalt> {
        let manifest_halt = |e: &ManifestError| PhaseHalt::Failed(PhaseFailure::from_manifest(e));
        let graph_halt = |e: &GraphError| PhaseHalt::Failed(PhaseFailure::from_graph(e));

        if let Some(spec) = &self.config.spec_path {
            if !tokio::fs::try_exists(spec).await.unwrap_or(false) {
                return Err(manifest_halt(&ManifestError::NotFound { path: spec.clone() }));
            }
        }

        let manifest = match source {
            PlanSource::ManifestFile(path) => {
                ComponentManifest::load(&path).map_err(|e| manifest_halt(&e))?
            }
            PlanSource::Manifest(manifest) => manifest,
        };

        let mut graph = manifest.to_graph().map_err(|e| graph_halt(&e))?;
        let levels = graph.compute_levels().map_err(|e| graph_halt(&e))?;
        for mismatch in manifest.level_hint_mismatches(&levels) {
            warn!(
                component = %mismatch.component,
                declared = mismatch.declared,
                derived = mismatch.derived,
                "Declared level disagrees with dependencies, using derived level"
            );
        }
        let build_order = BuildOrder::from_graph(&graph).map_err(|e| graph_halt(&e))?;

        info!(
            components = graph.len(),
            levels = build_order.len(),
            "Build plan ready"
        );
        aggregator.record_plan(manifest.project.clone(), build_order.clone());
        Ok(Plan { graph, build_order })
    }

    async fn scaffold_all(&self, plan: &Plan) -> Result<(), PhaseHalt> {
        for component in plan.graph.components() {
            debug!(component = %component.name, "Scaffolding");
            self.cancellable(self.collaborators.scaffolder.scaffold(component))
                .await?
                .map_err(|e| {
                    self.collaborator_halt(&e, |reason| PhaseFailure::Scaffold {
                        component: component.name.clone(),
                        reason,
                    })
                })?;
        }
        Ok(())
    }

    async fn generate_contracts(&self, plan: &Plan) -> Result<(), PhaseHalt> {
        for component in plan.graph.components() {
            debug!(component = %component.name, "Generating contract");
            self.cancellable(self.collaborators.contracts.generate(component))
                .await?
                .map_err(|e| {
                    self.collaborator_halt(&e, |reason| PhaseFailure::Contract {
                        component: component.name.clone(),
                        reason,
                    })
                })?;
        }
        Ok(())
    }

    async fn build_levels(
        &self,
        plan: &Plan,
        aggregator: &OutcomeAggregator,
    ) -> Result<(), PhaseHalt> {
        let dispatcher = BoundedDispatcher::new(self.config.max_parallel_agents)
            .with_timeout(self.config.component_timeout)
            .with_cancellation(self.cancel.clone())
            .with_event_sink(self.events.clone());

        for (level, names) in plan.build_order.iter() {
            if self.cancel.is_cancelled() {
                return Err(PhaseHalt::Aborted(self.cancel.reason_or_default()));
            }

            let components: Vec<Component> = names
                .iter()
                .filter_map(|name| plan.graph.get(name).cloned())
                .collect();
            info!(level, components = components.len(), "Dispatching build level");
            self.events
                .emit(
                    LEVEL_STARTED,
                    Some(serde_json::json!({ "level": level, "components": names })),
                )
                .await;

            let outcome = dispatcher
                .run_level(level, &components, self.collaborators.worker.clone())
                .await;
            aggregator.record_level(&outcome);
            self.events
                .emit(
                    LEVEL_COMPLETED,
                    Some(serde_json::json!({
                        "level": level,
                        "failed": outcome.failed_names(),
                        "interrupted": outcome.interrupted,
                    })),
                )
                .await;

            if outcome.interrupted {
                return Err(PhaseHalt::Aborted(self.cancel.reason_or_default()));
            }
            build_level_gate(&outcome).map_err(PhaseHalt::Failed)?;
        }
        Ok(())
    }

    async fn integrate(&self, aggregator: &OutcomeAggregator) -> Result<(), PhaseHalt> {
        let stats = self
            .cancellable(self.collaborators.integration.run())
            .await?
            .map_err(|e| {
                self.collaborator_halt(&e, |reason| PhaseFailure::IntegrationGate {
                    executed: 0,
                    total: 0,
                    failed: 0,
                    reason: format!("integration runner failed: {reason}"),
                })
            })?;

        info!(
            executed = stats.executed,
            total = stats.total,
            failed = stats.failed,
            "Integration suite finished"
        );
        aggregator.record_integration(stats);
        integration_gate(&stats).map_err(PhaseHalt::Failed)
    }

    async fn verify(&self, plan: &Plan, aggregator: &OutcomeAggregator) -> Result<(), PhaseHalt> {
        let mut results = Vec::with_capacity(plan.graph.len());

        for component in plan.graph.components() {
            let checked = self
                .cancellable(self.collaborators.quality.check(component))
                .await?;
            let quality = match checked {
                Ok(report) => ComponentQuality {
                    component: component.name.clone(),
                    findings: report.findings(&self.config.quality),
                    report: Some(report),
                },
                Err(CollaboratorError::Cancelled(_)) => {
                    return Err(PhaseHalt::Aborted(self.cancel.reason_or_default()));
                }
                Err(e) => ComponentQuality {
                    component: component.name.clone(),
                    report: None,
                    findings: vec![format!("quality check failed: {e}")],
                },
            };

            if !quality.passed() {
                warn!(
                    component = %quality.component,
                    findings = ?quality.findings,
                    "Quality checks failed"
                );
            }
            aggregator.record_quality(quality.clone());
            results.push(quality);
        }

        verification_gate(&results).map_err(PhaseHalt::Failed)
    }
}

impl std::fmt::Debug for PhasePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhasePipeline")
            .field("config", &self.config)
            .field("cancel", &self.cancel)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{IntegrationStats, QualityReport};
    use crate::core::{ComponentCategory, PhaseOutcome, RunStatus};
    use crate::events::CollectingEventSink;
    use crate::testing::{
        two_component_manifest, FakeContractGenerator, FakeIntegrationRunner, FakeQualityChecker,
        FakeScaffolder, FakeWorker, TestHarness,
    };
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_two_components_succeed_in_level_order() {
        let harness = TestHarness::new(2);
        let report = harness.run(two_component_manifest()).await;

        assert_eq!(report.status, RunStatus::Succeeded);
        assert_eq!(report.exit_code, 0);
        assert_eq!(harness.worker.calls(), vec!["cdp_types", "protocol_handler"]);
        assert_eq!(report.phases.len(), 6);
        assert!(report
            .phases
            .iter()
            .all(|p| p.outcome == PhaseOutcome::Passed));
    }

    #[tokio::test]
    async fn test_scaffold_failure_stops_at_first_component() {
        let harness = TestHarness::new(2)
            .with_scaffolder(FakeScaffolder::new().failing_on("cdp_types", "permission denied"));
        let report = harness.run(two_component_manifest()).await;

        assert_eq!(report.exit_code, 2);
        assert_eq!(report.first_failing_phase, Some(Phase::Scaffolding));
        assert_eq!(harness.scaffolder.calls(), vec!["cdp_types"]);
        assert_eq!(harness.contracts.call_count(), 0);
        assert_eq!(harness.worker.call_count(), 0);
    }

    #[tokio::test]
    async fn test_contract_failure_exit_code() {
        let harness = TestHarness::new(2).with_contracts(
            FakeContractGenerator::new().failing_on("protocol_handler", "schema invalid"),
        );
        let report = harness.run(two_component_manifest()).await;

        assert_eq!(report.exit_code, 4);
        assert_eq!(report.first_failing_phase, Some(Phase::ContractGeneration));
        assert_eq!(
            report.failure(),
            Some(&PhaseFailure::Contract {
                component: "protocol_handler".to_string(),
                reason: "schema invalid".to_string(),
            })
        );
        assert_eq!(harness.worker.call_count(), 0);
    }

    #[tokio::test]
    async fn test_integration_runner_error_fails_gate() {
        let harness = TestHarness::new(2)
            .with_integration(FakeIntegrationRunner::erroring("suite crashed"));
        let report = harness.run(two_component_manifest()).await;

        assert_eq!(report.exit_code, 5);
        assert!(report.failure().unwrap().to_string().contains("suite crashed"));
    }

    #[tokio::test]
    async fn test_verification_collects_every_finding() {
        let harness = TestHarness::new(2).with_quality(
            FakeQualityChecker::new()
                .with_report(
                    "cdp_types",
                    QualityReport {
                        coverage_pct: 55.0,
                        ..QualityReport::passing(0.0)
                    },
                )
                .erroring("protocol_handler", "clippy not installed"),
        );
        let report = harness.run(two_component_manifest()).await;

        assert_eq!(report.exit_code, 6);
        assert_eq!(harness.quality.calls().len(), 2);
        match report.failure().unwrap() {
            PhaseFailure::Verification { findings } => {
                assert_eq!(findings.len(), 2);
                assert!(findings[0].starts_with("cdp_types: coverage 55.0%"));
                assert!(findings[1].contains("clippy not installed"));
            }
            other => panic!("unexpected failure: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_spec_document_fails_planning() {
        let harness = TestHarness::new(1);
        let config = harness
            .config()
            .clone()
            .with_spec_path("/definitely/not/here/spec.md");
        let pipeline = harness.pipeline_with_config(config);

        let report = pipeline.run(PlanSource::Manifest(two_component_manifest())).await;

        assert_eq!(report.exit_code, 1);
        match report.failure().unwrap() {
            PhaseFailure::Planning { info, .. } => assert_eq!(info.code, "SPEC-001-MISSING"),
            other => panic!("unexpected failure: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_manifest_fails_planning() {
        let harness = TestHarness::new(1);
        let report = harness.run(ComponentManifest::new()).await;

        assert_eq!(report.exit_code, 1);
        assert_eq!(report.first_failing_phase, Some(Phase::Planning));
        assert_eq!(harness.scaffolder.call_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_before_run_aborts_planning() {
        let harness = TestHarness::new(1);
        let pipeline = harness.pipeline();
        pipeline.cancellation_token().cancel("operator stop");

        let report = pipeline.run(PlanSource::Manifest(two_component_manifest())).await;

        assert_eq!(report.status, RunStatus::Aborted);
        assert_eq!(report.exit_code, 130);
        assert_eq!(report.phases[0].phase, Phase::Planning);
        assert_eq!(report.phases[0].outcome, PhaseOutcome::Aborted);
    }

    #[tokio::test]
    async fn test_phase_events_emitted_in_order() {
        let sink = Arc::new(CollectingEventSink::new());
        let harness = TestHarness::new(2);
        let pipeline = harness.pipeline().with_event_sink(sink.clone());

        pipeline.run(PlanSource::Manifest(two_component_manifest())).await;

        let phases: Vec<String> = sink
            .events_of_type(PHASE_STARTED)
            .into_iter()
            .filter_map(|(_, data)| data?["phase"].as_str().map(str::to_string))
            .collect();
        assert_eq!(
            phases,
            vec![
                "planning",
                "scaffolding",
                "contract_generation",
                "build",
                "integration",
                "verification"
            ]
        );
        assert_eq!(sink.events_of_type(RUN_COMPLETED).len(), 1);
    }

    #[tokio::test]
    async fn test_level_hint_mismatch_is_advisory() {
        let mut manifest = two_component_manifest();
        manifest.components[1].level = Some(4);
        let harness = TestHarness::new(1);

        let report = harness.run(manifest).await;

        assert_eq!(report.exit_code, 0);
        assert_eq!(report.build_order.position_of("protocol_handler"), Some(1));
    }

    #[tokio::test]
    async fn test_build_stops_after_failing_level() {
        let manifest = ComponentManifest::new()
            .with_component(&Component::new("a", ComponentCategory::Base))
            .with_component(&Component::new("b", ComponentCategory::Core).with_dependency("a"))
            .with_component(&Component::new("c", ComponentCategory::Core).with_dependency("a"))
            .with_component(&Component::new("d", ComponentCategory::Feature).with_dependency("b"));
        let harness = TestHarness::new(2).with_worker(FakeWorker::new().failing("b", "tests failed"));

        let report = harness.run(manifest).await;

        assert_eq!(report.exit_code, 3);
        assert!(harness.worker.was_called("c"));
        assert!(!harness.worker.was_called("d"));
        assert_eq!(report.failed_components(), vec!["b"]);
        assert_eq!(report.component("c").unwrap().status, crate::core::ComponentStatus::Succeeded);
        assert_eq!(
            report.failure(),
            Some(&PhaseFailure::ComponentBuild {
                level: 1,
                failed: vec!["b".to_string()],
            })
        );
        assert_eq!(report.integration, None::<IntegrationStats>);
    }
}
