//! Run telemetry events.
//!
//! Progress that used to be narrated on stdout is emitted as typed events
//! through an [`EventSink`].

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// A phase was entered.
pub const PHASE_STARTED: &str = "phase.started";
/// A phase gate passed.
pub const PHASE_COMPLETED: &str = "phase.completed";
/// A phase gate failed.
pub const PHASE_FAILED: &str = "phase.failed";
/// A phase was interrupted by cancellation.
pub const PHASE_ABORTED: &str = "phase.aborted";
/// A build level was dispatched.
pub const LEVEL_STARTED: &str = "level.started";
/// Every component of a build level reached a terminal result.
pub const LEVEL_COMPLETED: &str = "level.completed";
/// A component was admitted to the worker pool.
pub const COMPONENT_STARTED: &str = "component.started";
/// A component reached a terminal result.
pub const COMPONENT_COMPLETED: &str = "component.completed";
/// The run report was finalized.
pub const RUN_COMPLETED: &str = "run.completed";
