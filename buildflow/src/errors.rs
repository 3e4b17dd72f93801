//! Error types for the buildflow orchestrator.
//!
//! Structural errors (configuration, manifest, graph) abort a run before or at
//! Planning. Per-phase gate failures are carried as [`PhaseFailure`] values and
//! recorded in the run report rather than propagated as Rust errors.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for buildflow operations.
#[derive(Debug, Error)]
pub enum BuildflowError {
    /// Settings were missing or invalid.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// The component graph could not be built or leveled.
    #[error("{0}")]
    Graph(#[from] GraphError),

    /// The component manifest could not be loaded.
    #[error("{0}")]
    Manifest(#[from] ManifestError),

    /// A collaborator call failed.
    #[error("{0}")]
    Collaborator(#[from] CollaboratorError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Stable diagnostic metadata attached to structural errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ErrorInfo {
    /// Error code (e.g., "GRAPH-003-CYCLE").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }
}

/// Error raised when orchestration settings are missing or invalid.
///
/// No phase is entered when this occurs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Configuration error: {message}")]
pub struct ConfigurationError {
    /// The offending setting, if one can be named.
    pub field: Option<String>,
    /// The error message.
    pub message: String,
}

impl ConfigurationError {
    /// Creates a configuration error not tied to a single field.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            field: None,
            message: message.into(),
        }
    }

    /// Creates a configuration error for a named field.
    #[must_use]
    pub fn for_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: Some(field.into()),
            message: message.into(),
        }
    }
}

/// Errors raised while building or leveling the component graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// A component name was declared twice.
    #[error("Component '{name}' is already declared")]
    DuplicateComponent {
        /// The duplicated name.
        name: String,
    },

    /// A dependency names a component that is not in the graph.
    #[error("Component '{component}' depends on unknown component '{dependency}'")]
    UnknownDependency {
        /// The declaring component.
        component: String,
        /// The missing dependency.
        dependency: String,
    },

    /// A component lists itself as a dependency.
    #[error("Component '{name}' cannot depend on itself")]
    SelfDependency {
        /// The component name.
        name: String,
    },

    /// Level assignment did not converge.
    #[error("Dependency cycle detected; unresolved components: {}", unresolved.join(", "))]
    CyclicDependency {
        /// Components whose level could not be resolved, in declaration order.
        unresolved: Vec<String>,
    },

    /// The graph has no components.
    #[error("Component graph is empty")]
    EmptyGraph,
}

impl GraphError {
    /// Returns the stable diagnostic info for this error.
    #[must_use]
    pub fn info(&self) -> ErrorInfo {
        match self {
            Self::DuplicateComponent { name } => ErrorInfo::new(
                "GRAPH-001-DUPLICATE",
                format!("Component '{name}' declared more than once"),
            )
            .with_fix_hint("Give every component a unique name."),
            Self::UnknownDependency { dependency, .. } => ErrorInfo::new(
                "GRAPH-002-UNKNOWN_DEP",
                format!("Dependency '{dependency}' not found"),
            )
            .with_fix_hint("Check the dependency list for typos or declare the missing component."),
            Self::SelfDependency { name } => ErrorInfo::new(
                "GRAPH-004-SELF_DEP",
                format!("Component '{name}' depends on itself"),
            )
            .with_fix_hint("Remove the component from its own dependency list."),
            Self::CyclicDependency { unresolved } => ErrorInfo::new(
                "GRAPH-003-CYCLE",
                format!("Dependency cycle among: {}", unresolved.join(", ")),
            )
            .with_fix_hint("Remove one of the dependencies in the cycle to break it."),
            Self::EmptyGraph => ErrorInfo::new("GRAPH-005-EMPTY", "No components declared")
                .with_fix_hint("Declare at least one component in the manifest."),
        }
    }
}

/// Errors raised while loading the component manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The manifest or specification document does not exist.
    #[error("Specification artifact not found: {}", path.display())]
    NotFound {
        /// The missing path.
        path: PathBuf,
    },

    /// The manifest could not be read.
    #[error("Failed to read manifest {}: {source}", path.display())]
    Read {
        /// The manifest path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The manifest is not valid JSON for the expected shape.
    #[error("Failed to parse manifest {}: {source}", path.display())]
    Parse {
        /// The manifest path.
        path: PathBuf,
        /// The underlying parse error.
        #[source]
        source: serde_json::Error,
    },
}

impl ManifestError {
    /// Returns the stable diagnostic info for this error.
    #[must_use]
    pub fn info(&self) -> ErrorInfo {
        match self {
            Self::NotFound { path } => ErrorInfo::new(
                "SPEC-001-MISSING",
                format!("{} does not exist", path.display()),
            )
            .with_fix_hint("Point manifest_path/spec_path at existing files."),
            Self::Read { path, .. } => {
                ErrorInfo::new("SPEC-002-UNREADABLE", format!("{} unreadable", path.display()))
            }
            Self::Parse { path, .. } => ErrorInfo::new(
                "SPEC-003-INVALID",
                format!("{} is not a valid component manifest", path.display()),
            )
            .with_fix_hint("The manifest must be a JSON object with a `components` array."),
        }
    }
}

/// Errors returned by external collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    /// The collaborator reported a failure.
    #[error("{0}")]
    Failed(String),

    /// A shell command exited unsuccessfully.
    #[error("Command `{command}` failed (exit status {status:?}): {stderr}")]
    Command {
        /// The command line.
        command: String,
        /// The exit code, if the process exited normally.
        status: Option<i32>,
        /// Tail of the captured stderr.
        stderr: String,
    },

    /// The collaborator produced output that could not be interpreted.
    #[error("Invalid collaborator output: {0}")]
    InvalidOutput(String),

    /// The collaborator exceeded its time budget.
    #[error("Timed out after {}s", limit.as_secs_f64())]
    TimedOut {
        /// The configured limit.
        limit: std::time::Duration,
    },

    /// The collaborator observed run cancellation.
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(String),
}

impl CollaboratorError {
    /// Creates a generic failure.
    #[must_use]
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }
}

impl From<std::io::Error> for CollaboratorError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Why a phase gate failed. Recorded in the run report.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PhaseFailure {
    /// Specification artifact or component graph invalid.
    #[error("Planning failed: {message}")]
    Planning {
        /// What went wrong.
        message: String,
        /// Stable diagnostic info.
        info: ErrorInfo,
    },

    /// A scaffold call failed.
    #[error("Scaffolding failed for '{component}': {reason}")]
    Scaffold {
        /// The component being scaffolded.
        component: String,
        /// The collaborator's reason.
        reason: String,
    },

    /// A contract could not be generated.
    #[error("Contract generation failed for '{component}': {reason}")]
    Contract {
        /// The component whose contract failed.
        component: String,
        /// The collaborator's reason.
        reason: String,
    },

    /// One or more components failed in a build level.
    #[error("Build failed at level {level}: {}", failed.join(", "))]
    ComponentBuild {
        /// The level index that failed.
        level: usize,
        /// Failed component names, in level order.
        failed: Vec<String>,
    },

    /// Integration execution or pass rate below 100%.
    #[error("Integration gate failed: {reason}")]
    IntegrationGate {
        /// Tests actually executed.
        executed: u64,
        /// Tests declared.
        total: u64,
        /// Tests failed.
        failed: u64,
        /// Human readable explanation.
        reason: String,
    },

    /// One or more final acceptance checks failed.
    #[error("Verification failed: {}", findings.join("; "))]
    Verification {
        /// Every failing check, as `component: check` strings.
        findings: Vec<String>,
    },
}

impl PhaseFailure {
    /// Builds a Planning failure from a graph error.
    #[must_use]
    pub fn from_graph(err: &GraphError) -> Self {
        Self::Planning {
            message: err.to_string(),
            info: err.info(),
        }
    }

    /// Builds a Planning failure from a manifest error.
    #[must_use]
    pub fn from_manifest(err: &ManifestError) -> Self {
        Self::Planning {
            message: err.to_string(),
            info: err.info(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_info_creation() {
        let info = ErrorInfo::new("TEST-001", "Test error").with_fix_hint("Fix this");

        assert_eq!(info.code, "TEST-001");
        assert_eq!(info.summary, "Test error");
        assert_eq!(info.fix_hint, Some("Fix this".to_string()));
    }

    #[test]
    fn test_cyclic_dependency_message() {
        let err = GraphError::CyclicDependency {
            unresolved: vec!["a".to_string(), "b".to_string()],
        };

        assert!(err.to_string().contains("a, b"));
        assert_eq!(err.info().code, "GRAPH-003-CYCLE");
    }

    #[test]
    fn test_unknown_dependency_info() {
        let err = GraphError::UnknownDependency {
            component: "dom_domain".to_string(),
            dependency: "protocol".to_string(),
        };

        assert_eq!(err.info().code, "GRAPH-002-UNKNOWN_DEP");
        assert!(err.to_string().contains("'protocol'"));
    }

    #[test]
    fn test_configuration_error_field() {
        let err = ConfigurationError::for_field("max_parallel_agents", "must be at least 1");
        assert_eq!(err.field.as_deref(), Some("max_parallel_agents"));
        assert!(err.to_string().starts_with("Configuration error"));
    }

    #[test]
    fn test_phase_failure_serializes_with_kind_tag() {
        let failure = PhaseFailure::ComponentBuild {
            level: 2,
            failed: vec!["dom_domain".to_string()],
        };
        let json = serde_json::to_value(&failure).unwrap();

        assert_eq!(json["kind"], "component_build");
        assert_eq!(json["level"], 2);
    }

    #[test]
    fn test_collaborator_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: CollaboratorError = io.into();
        assert!(matches!(err, CollaboratorError::Io(ref msg) if msg.contains("denied")));
    }
}
