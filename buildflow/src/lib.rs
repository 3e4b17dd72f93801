//! # Buildflow
//!
//! Dependency-leveled phase scheduling for multi-component builds.
//!
//! Buildflow takes a manifest of components and their dependencies and
//! drives them through a fixed sequence of gated phases:
//!
//! - **Planning**: validate the manifest and group components into dependency levels
//! - **Scaffolding** and **ContractGeneration**: prepare each component's working area
//! - **Build**: dispatch each level to a bounded pool of workers
//! - **Integration** and **Verification**: check test and quality thresholds
//!
//! Every run produces a [`RunReport`](report::RunReport) whose exit code
//! names the first failing phase.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use buildflow::prelude::*;
//!
//! let config = OrchestrationConfig::load(Path::new("orchestration/orchestration-config.json"))?;
//! let collaborators = Collaborators::from_config(&config);
//! let pipeline = PhasePipeline::new(config.clone(), collaborators);
//!
//! let report = pipeline.run(PlanSource::ManifestFile(config.manifest_path)).await;
//! std::process::exit(report.exit_code);
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod cli;
pub mod collaborators;
pub mod config;
pub mod core;
pub mod dispatch;
pub mod errors;
pub mod events;
pub mod graph;
pub mod observability;
pub mod pipeline;
pub mod report;
pub mod testing;

/// Crate version, as reported by `buildflow --version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::collaborators::{
        Collaborators, ContractGenerator, IntegrationStats, IntegrationTestRunner,
        QualityChecker, QualityReport, RetryConfig, Scaffolder, Worker,
    };
    pub use crate::config::{OrchestrationConfig, QualityThresholds};
    pub use crate::core::{
        ComponentCategory, ComponentResult, ComponentStatus, PhaseOutcome, RunStatus,
    };
    pub use crate::dispatch::{BoundedDispatcher, LevelOutcome};
    pub use crate::errors::{
        BuildflowError, CollaboratorError, ConfigurationError, GraphError, ManifestError,
        PhaseFailure,
    };
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::graph::{BuildOrder, Component, ComponentGraph, ComponentManifest};
    pub use crate::pipeline::{Phase, PhasePipeline, PlanSource};
    pub use crate::report::{OutcomeAggregator, RunReport};
}
