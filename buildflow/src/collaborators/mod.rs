//! External collaborators driven by the phase pipeline.
//!
//! The pipeline only knows the traits in this module. Default
//! implementations write to the filesystem or shell out to commands; tests
//! use the fakes in [`crate::testing`].

mod command;
mod fs;
mod retry;
mod traits;

pub use command::{render_command, CommandIntegrationRunner, CommandQualityChecker, CommandWorker};
pub use fs::{ContractDocument, FsScaffolder, JsonContractGenerator};
pub use retry::{BackoffStrategy, JitterStrategy, RetryConfig, RetryingWorker};
pub use traits::{
    Collaborators, ContractGenerator, EmptyIntegrationSuite, IntegrationStats,
    IntegrationTestRunner, QualityChecker, QualityReport, Scaffolder, SkippedQualityChecks, Worker,
};
