//! Manifests and a pipeline harness wired to fakes.

use std::sync::Arc;

use super::{
    FakeContractGenerator, FakeIntegrationRunner, FakeQualityChecker, FakeScaffolder, FakeWorker,
};
use crate::collaborators::Collaborators;
use crate::config::OrchestrationConfig;
use crate::core::ComponentCategory;
use crate::events::NoOpEventSink;
use crate::graph::{Component, ComponentManifest, ComponentMetadata};
use crate::pipeline::{PhasePipeline, PlanSource};
use crate::report::RunReport;

/// `cdp_types` and `protocol_handler`, where the second depends on the first.
#[must_use]
pub fn two_component_manifest() -> ComponentManifest {
    ComponentManifest::new()
        .with_project("cdp-minimal")
        .with_component(&Component::new("cdp_types", ComponentCategory::Base))
        .with_component(
            &Component::new("protocol_handler", ComponentCategory::Core)
                .with_dependency("cdp_types"),
        )
}

/// An eleven-component, five-level DevTools protocol project.
#[must_use]
pub fn devtools_manifest() -> ComponentManifest {
    let domain_deps = ["cdp_types", "protocol_handler"];
    let domains = [
        ("dom_domain", "DOM and CSS domain implementations", 60_000),
        ("network_domain", "Network monitoring and interception", 55_000),
        ("runtime_debugger", "JavaScript Runtime and Debugger domains", 70_000),
        ("profiler_domains", "Performance profiling and heap analysis", 60_000),
        ("console_storage", "Console REPL and storage inspection", 45_000),
        ("browser_page_domains", "Browser, Page, Security, and Emulation domains", 50_000),
    ];

    let mut manifest = ComponentManifest::new()
        .with_project("devtools")
        .with_component(
            &Component::new("cdp_types", ComponentCategory::Base).with_metadata(
                ComponentMetadata::new("CDP protocol types, events, and error definitions")
                    .with_estimated_tokens(30_000)
                    .with_tech_stack(["serde", "serde_json"]),
            ),
        )
        .with_component(
            &Component::new("cdp_server", ComponentCategory::Core)
                .with_dependency("cdp_types")
                .with_metadata(
                    ComponentMetadata::new("WebSocket server and session management")
                        .with_estimated_tokens(40_000)
                        .with_tech_stack(["tokio", "async-trait"]),
                ),
        )
        .with_component(
            &Component::new("protocol_handler", ComponentCategory::Core)
                .with_dependency("cdp_types")
                .with_metadata(
                    ComponentMetadata::new("CDP message routing and domain registry")
                        .with_estimated_tokens(35_000),
                ),
        );

    for (name, description, tokens) in domains {
        manifest = manifest.with_component(
            &Component::new(name, ComponentCategory::Feature)
                .with_dependencies(domain_deps)
                .with_metadata(ComponentMetadata::new(description).with_estimated_tokens(tokens)),
        );
    }

    let mut integration_deps = vec!["cdp_types", "cdp_server", "protocol_handler"];
    integration_deps.extend(domains.iter().map(|(name, _, _)| *name));

    manifest
        .with_component(
            &Component::new("devtools_component", ComponentCategory::Integration)
                .with_dependencies(integration_deps)
                .with_metadata(
                    ComponentMetadata::new("Main DevTools orchestration and integration")
                        .with_estimated_tokens(50_000),
                ),
        )
        .with_component(
            &Component::new("devtools_api", ComponentCategory::Application)
                .with_dependency("devtools_component")
                .with_metadata(
                    ComponentMetadata::new("Public API and configuration")
                        .with_estimated_tokens(15_000),
                ),
        )
}

/// A pipeline wired to fakes that all succeed unless replaced.
///
/// The fakes stay reachable after the run so tests can inspect calls.
pub struct TestHarness {
    config: OrchestrationConfig,
    /// Scaffold fake.
    pub scaffolder: Arc<FakeScaffolder>,
    /// Contract fake.
    pub contracts: Arc<FakeContractGenerator>,
    /// Worker fake.
    pub worker: Arc<FakeWorker>,
    /// Integration fake.
    pub integration: Arc<FakeIntegrationRunner>,
    /// Quality fake.
    pub quality: Arc<FakeQualityChecker>,
}

impl TestHarness {
    /// Creates a harness with the given agent limit. Zero is raised to one.
    #[must_use]
    pub fn new(max_parallel_agents: usize) -> Self {
        let config = OrchestrationConfig::new(max_parallel_agents.max(1))
            .unwrap_or_else(|e| panic!("invalid harness settings: {e}"));
        Self {
            config,
            scaffolder: Arc::new(FakeScaffolder::new()),
            contracts: Arc::new(FakeContractGenerator::new()),
            worker: Arc::new(FakeWorker::new()),
            integration: Arc::new(FakeIntegrationRunner::default()),
            quality: Arc::new(FakeQualityChecker::new()),
        }
    }

    /// Replaces the settings.
    #[must_use]
    pub fn with_config(mut self, config: OrchestrationConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the scaffolder.
    #[must_use]
    pub fn with_scaffolder(mut self, scaffolder: FakeScaffolder) -> Self {
        self.scaffolder = Arc::new(scaffolder);
        self
    }

    /// Replaces the contract generator.
    #[must_use]
    pub fn with_contracts(mut self, contracts: FakeContractGenerator) -> Self {
        self.contracts = Arc::new(contracts);
        self
    }

    /// Replaces the worker.
    #[must_use]
    pub fn with_worker(mut self, worker: FakeWorker) -> Self {
        self.worker = Arc::new(worker);
        self
    }

    /// Replaces the integration runner.
    #[must_use]
    pub fn with_integration(mut self, integration: FakeIntegrationRunner) -> Self {
        self.integration = Arc::new(integration);
        self
    }

    /// Replaces the quality checker.
    #[must_use]
    pub fn with_quality(mut self, quality: FakeQualityChecker) -> Self {
        self.quality = Arc::new(quality);
        self
    }

    /// Returns the settings.
    #[must_use]
    pub fn config(&self) -> &OrchestrationConfig {
        &self.config
    }

    /// Bundles the fakes.
    #[must_use]
    pub fn collaborators(&self) -> Collaborators {
        Collaborators::new(
            self.scaffolder.clone(),
            self.contracts.clone(),
            self.worker.clone(),
            self.integration.clone(),
            self.quality.clone(),
        )
    }

    /// Builds a pipeline over the fakes.
    #[must_use]
    pub fn pipeline(&self) -> PhasePipeline {
        self.pipeline_with_config(self.config.clone())
    }

    /// Builds a pipeline over the fakes with other settings.
    #[must_use]
    pub fn pipeline_with_config(&self, config: OrchestrationConfig) -> PhasePipeline {
        PhasePipeline::new(config, self.collaborators()).with_event_sink(Arc::new(NoOpEventSink))
    }

    /// Runs a fresh pipeline over an in-memory manifest.
    pub async fn run(&self, manifest: ComponentManifest) -> RunReport {
        self.pipeline().run(PlanSource::Manifest(manifest)).await
    }
}

impl std::fmt::Debug for TestHarness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestHarness")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::BuildOrder;

    #[test]
    fn test_devtools_manifest_levels() {
        let graph = devtools_manifest().to_graph().unwrap();
        let order = BuildOrder::from_graph(&graph).unwrap();

        assert_eq!(graph.len(), 11);
        assert_eq!(order.len(), 5);
        assert_eq!(order.levels()[0], vec!["cdp_types"]);
        assert_eq!(order.levels()[1], vec!["cdp_server", "protocol_handler"]);
        assert_eq!(order.levels()[2].len(), 6);
        assert_eq!(order.levels()[4], vec!["devtools_api"]);
    }

    #[tokio::test]
    async fn test_harness_defaults_succeed() {
        let report = TestHarness::new(3).run(devtools_manifest()).await;
        assert!(report.is_success());
        assert_eq!(report.components.len(), 11);
    }
}
