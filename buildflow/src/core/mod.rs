//! Core domain model types for buildflow.
//!
//! This module contains the fundamental value types shared by every layer:
//! - Component category and status enums
//! - Run and phase outcome enums
//! - The per-component result type

mod result;
mod status;

pub use result::ComponentResult;
pub use status::{ComponentCategory, ComponentStatus, PhaseOutcome, RunStatus};
