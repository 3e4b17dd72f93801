//! Component status and category enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The architectural tier a component belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentCategory {
    /// Shared types and definitions with no dependencies.
    Base,
    /// Core services other features build on.
    Core,
    /// A feature domain.
    #[default]
    Feature,
    /// Glue that wires features together.
    Integration,
    /// The public, user-facing surface.
    Application,
}

impl fmt::Display for ComponentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Base => write!(f, "base"),
            Self::Core => write!(f, "core"),
            Self::Feature => write!(f, "feature"),
            Self::Integration => write!(f, "integration"),
            Self::Application => write!(f, "application"),
        }
    }
}

/// The terminal status of one component in one phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentStatus {
    /// The component's work completed successfully.
    Succeeded,
    /// The component's work failed.
    Failed,
    /// The component was never run to completion (e.g. the run was cancelled).
    Skipped,
}

impl fmt::Display for ComponentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

impl ComponentStatus {
    /// Returns true if the status indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// Returns true if the status indicates failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

/// The overall status of an orchestration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The run has not terminated yet.
    #[default]
    Running,
    /// Every phase passed.
    Succeeded,
    /// A phase gate failed.
    Failed,
    /// The run was cancelled externally.
    Aborted,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

impl RunStatus {
    /// Returns true once the run has reached a final status.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// How a single phase ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseOutcome {
    /// The gate passed.
    Passed,
    /// The gate failed.
    Failed,
    /// The phase was interrupted by cancellation.
    Aborted,
}

impl fmt::Display for PhaseOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => write!(f, "passed"),
            Self::Failed => write!(f, "failed"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}
