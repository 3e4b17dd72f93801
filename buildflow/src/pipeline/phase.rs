//! The fixed phase sequence and its exit codes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Exit code for a fully successful run.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code for a run stopped by cancellation.
pub const EXIT_ABORTED: i32 = 130;

/// One stage of the orchestration state machine.
///
/// Phases run in declaration order, each at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Validate the manifest and level the component graph.
    Planning,
    /// Materialize every component's working area.
    Scaffolding,
    /// Produce every component's interface contract.
    ContractGeneration,
    /// Build components level by level.
    Build,
    /// Run the cross-component test suite.
    Integration,
    /// Run acceptance checks on every component.
    Verification,
}

impl Phase {
    /// Every phase in execution order.
    pub const ALL: [Self; 6] = [
        Self::Planning,
        Self::Scaffolding,
        Self::ContractGeneration,
        Self::Build,
        Self::Integration,
        Self::Verification,
    ];

    /// Returns the phase name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::Scaffolding => "scaffolding",
            Self::ContractGeneration => "contract_generation",
            Self::Build => "build",
            Self::Integration => "integration",
            Self::Verification => "verification",
        }
    }

    /// Process exit code when this phase is the first to fail.
    ///
    /// The table does not follow phase order: Build is 3 and
    /// ContractGeneration is 4.
    #[must_use]
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Planning => 1,
            Self::Scaffolding => 2,
            Self::Build => 3,
            Self::ContractGeneration => 4,
            Self::Integration => 5,
            Self::Verification => 6,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_is_in_execution_order() {
        assert_eq!(Phase::ALL[0], Phase::Planning);
        assert_eq!(Phase::ALL[5], Phase::Verification);
        assert!(Phase::ALL.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn test_exit_code_table() {
        assert_eq!(Phase::Planning.exit_code(), 1);
        assert_eq!(Phase::Scaffolding.exit_code(), 2);
        assert_eq!(Phase::Build.exit_code(), 3);
        assert_eq!(Phase::ContractGeneration.exit_code(), 4);
        assert_eq!(Phase::Integration.exit_code(), 5);
        assert_eq!(Phase::Verification.exit_code(), 6);
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&Phase::ContractGeneration).unwrap();
        assert_eq!(json, "\"contract_generation\"");
        assert_eq!(Phase::ContractGeneration.to_string(), "contract_generation");
    }
}
