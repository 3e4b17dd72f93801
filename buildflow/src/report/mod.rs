//! Run report and the aggregator that maintains it.

mod aggregator;
mod run_report;

pub use aggregator::OutcomeAggregator;
pub use run_report::{ComponentQuality, PhaseRecord, RunReport};
