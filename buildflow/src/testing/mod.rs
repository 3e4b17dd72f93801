//! Testing utilities for buildflow runs.
//!
//! This module provides:
//! - Deterministic fake collaborators
//! - Report assertions
//! - Ready-made manifests and a pipeline harness

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{
    assert_component_status, assert_failed_at, assert_no_phase_after, assert_run_succeeded,
};
pub use fixtures::{devtools_manifest, two_component_manifest, TestHarness};
pub use mocks::{
    FakeContractGenerator, FakeIntegrationRunner, FakeQualityChecker, FakeScaffolder, FakeWorker,
};
