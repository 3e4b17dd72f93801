//! Per-component result type with factory methods.

use super::ComponentStatus;
use serde::{Deserialize, Serialize};

/// The outcome of one component in one phase.
///
/// Results are values: the dispatcher returns them and only the outcome
/// aggregator stores them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentResult {
    /// The component name.
    pub component: String,

    /// The terminal status.
    pub status: ComponentStatus,

    /// Error or skip explanation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,

    /// Wall-clock time spent, in milliseconds.
    #[serde(default)]
    pub duration_ms: f64,

    /// Worker attempts made; zero when the worker was never invoked.
    #[serde(default)]
    pub attempts: u32,
}

impl ComponentResult {
    fn with_status(component: impl Into<String>, status: ComponentStatus) -> Self {
        Self {
            component: component.into(),
            status,
            diagnostic: None,
            duration_ms: 0.0,
            attempts: 0,
        }
    }

    /// Creates a successful result.
    #[must_use]
    pub fn succeeded(component: impl Into<String>) -> Self {
        Self::with_status(component, ComponentStatus::Succeeded)
    }

    /// Creates a failed result carrying a diagnostic.
    #[must_use]
    pub fn failed(component: impl Into<String>, diagnostic: impl Into<String>) -> Self {
        Self::with_status(component, ComponentStatus::Failed).with_diagnostic(diagnostic)
    }

    /// Creates a skipped result with a reason.
    #[must_use]
    pub fn skipped(component: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::with_status(component, ComponentStatus::Skipped).with_diagnostic(reason)
    }

    /// Sets the diagnostic payload.
    #[must_use]
    pub fn with_diagnostic(mut self, diagnostic: impl Into<String>) -> Self {
        self.diagnostic = Some(diagnostic.into());
        self
    }

    /// Sets the duration.
    #[must_use]
    pub fn with_duration_ms(mut self, duration_ms: f64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// Sets the attempt count.
    #[must_use]
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Returns true if the component succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns true if the component failed.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.status.is_failure()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factories() {
        let ok = ComponentResult::succeeded("cdp_types");
        assert!(ok.is_success());
        assert!(ok.diagnostic.is_none());

        let failed = ComponentResult::failed("cdp_server", "compile error");
        assert!(failed.is_failure());
        assert_eq!(failed.diagnostic.as_deref(), Some("compile error"));

        let skipped = ComponentResult::skipped("dom_domain", "run cancelled");
        assert_eq!(skipped.status, ComponentStatus::Skipped);
        assert!(!skipped.is_failure());
    }

    #[test]
    fn test_chaining() {
        let result = ComponentResult::succeeded("x")
            .with_duration_ms(12.5)
            .with_attempts(2);

        assert_eq!(result.attempts, 2);
        assert!((result.duration_ms - 12.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_serialization_omits_empty_diagnostic() {
        let json = serde_json::to_value(ComponentResult::succeeded("x")).unwrap();
        assert_eq!(json["status"], "succeeded");
        assert!(json.get("diagnostic").is_none());
    }
}
