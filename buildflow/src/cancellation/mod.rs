//! Cooperative cancellation for orchestration runs.

mod token;

pub use token::CancellationToken;
