//! Phase pipeline: the orchestration state machine.
//!
//! This module provides:
//! - The fixed phase sequence and exit code table
//! - Gate predicates for Build, Integration and Verification
//! - [`PhasePipeline`], which drives a run end to end

mod gates;
mod orchestrator;
mod phase;

pub use gates::{build_level_gate, integration_gate, verification_gate};
pub use orchestrator::{PhasePipeline, PlanSource};
pub use phase::{Phase, EXIT_ABORTED, EXIT_SUCCESS};
