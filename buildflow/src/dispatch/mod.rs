//! Bounded-parallel dispatch of build levels.

mod dispatcher;

pub use dispatcher::{BoundedDispatcher, LevelOutcome};
