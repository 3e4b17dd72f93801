//! Deterministic fake collaborators.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::cancellation::CancellationToken;
use crate::collaborators::{
    ContractGenerator, IntegrationStats, IntegrationTestRunner, QualityChecker, QualityReport,
    Scaffolder, Worker,
};
use crate::core::ComponentResult;
use crate::errors::CollaboratorError;
use crate::graph::Component;

#[derive(Debug, Clone)]
enum Behavior {
    Succeed,
    Fail(String),
    Error(String),
    Hang,
    Panic,
}

/// Tracks how many builds are running at once.
struct InFlightGuard<'a> {
    counter: &'a AtomicUsize,
}

impl<'a> InFlightGuard<'a> {
    fn enter(counter: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self { counter }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A scripted worker that records calls and measures concurrency.
///
/// Components succeed unless scripted otherwise.
#[derive(Debug, Default)]
pub struct FakeWorker {
    behaviors: HashMap<String, Behavior>,
    delays: HashMap<String, Duration>,
    default_delay: Duration,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeWorker {
    /// Creates a worker where every component succeeds immediately.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how long every build takes.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    /// Sets how long one component's build takes.
    #[must_use]
    pub fn slow(mut self, component: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(component.into(), delay);
        self
    }

    /// The component's build returns a failed result.
    #[must_use]
    pub fn failing(mut self, component: impl Into<String>, diagnostic: impl Into<String>) -> Self {
        self.behaviors
            .insert(component.into(), Behavior::Fail(diagnostic.into()));
        self
    }

    /// The component's build returns an error.
    #[must_use]
    pub fn erroring(mut self, component: impl Into<String>, message: impl Into<String>) -> Self {
        self.behaviors
            .insert(component.into(), Behavior::Error(message.into()));
        self
    }

    /// The component's build never finishes on its own.
    #[must_use]
    pub fn hanging(mut self, component: impl Into<String>) -> Self {
        self.behaviors.insert(component.into(), Behavior::Hang);
        self
    }

    /// The component's build panics.
    #[must_use]
    pub fn panicking(mut self, component: impl Into<String>) -> Self {
        self.behaviors.insert(component.into(), Behavior::Panic);
        self
    }

    /// Component names in the order builds started.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Number of builds started.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Returns true if a build was started for the component.
    #[must_use]
    pub fn was_called(&self, component: &str) -> bool {
        self.calls.lock().iter().any(|c| c == component)
    }

    /// Highest number of builds observed running at once.
    #[must_use]
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Worker for FakeWorker {
    async fn build(
        &self,
        component: &Component,
        cancel: &CancellationToken,
    ) -> Result<ComponentResult, CollaboratorError> {
        let name = component.name.as_str();
        self.calls.lock().push(name.to_string());
        let _guard = InFlightGuard::enter(&self.in_flight, &self.peak);

        let delay = self.delays.get(name).copied().unwrap_or(self.default_delay);
        if !delay.is_zero() {
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = cancel.cancelled() => {
                    return Err(CollaboratorError::Cancelled(cancel.reason_or_default()));
                }
            }
        }

        match self.behaviors.get(name).cloned().unwrap_or(Behavior::Succeed) {
            Behavior::Succeed => Ok(ComponentResult::succeeded(name)),
            Behavior::Fail(diagnostic) => Ok(ComponentResult::failed(name, diagnostic)),
            Behavior::Error(message) => Err(CollaboratorError::failed(message)),
            Behavior::Hang => {
                cancel.cancelled().await;
                Err(CollaboratorError::Cancelled(cancel.reason_or_default()))
            }
            Behavior::Panic => panic!("scripted panic while building {name}"),
        }
    }
}

/// Records per-component calls and fails on one scripted component.
#[derive(Debug, Default)]
struct CallJournal {
    calls: Mutex<Vec<String>>,
    fail_on: Option<(String, String)>,
}

impl CallJournal {
    fn record(&self, component: &Component) -> Result<(), CollaboratorError> {
        self.calls.lock().push(component.name.clone());
        match &self.fail_on {
            Some((name, reason)) if *name == component.name => {
                Err(CollaboratorError::failed(reason.clone()))
            }
            _ => Ok(()),
        }
    }
}

/// A scaffolder that records calls.
#[derive(Debug, Default)]
pub struct FakeScaffolder {
    journal: CallJournal,
}

impl FakeScaffolder {
    /// Creates a scaffolder that always succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails when scaffolding the named component.
    #[must_use]
    pub fn failing_on(mut self, component: impl Into<String>, reason: impl Into<String>) -> Self {
        self.journal.fail_on = Some((component.into(), reason.into()));
        self
    }

    /// Component names in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.journal.calls.lock().clone()
    }

    /// Number of calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.journal.calls.lock().len()
    }
}

#[async_trait]
impl Scaffolder for FakeScaffolder {
    async fn scaffold(&self, component: &Component) -> Result<(), CollaboratorError> {
        self.journal.record(component)
    }
}

/// A contract generator that records calls.
#[derive(Debug, Default)]
pub struct FakeContractGenerator {
    journal: CallJournal,
}

impl FakeContractGenerator {
    /// Creates a generator that always succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails when generating the named component's contract.
    #[must_use]
    pub fn failing_on(mut self, component: impl Into<String>, reason: impl Into<String>) -> Self {
        self.journal.fail_on = Some((component.into(), reason.into()));
        self
    }

    /// Component names in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.journal.calls.lock().clone()
    }

    /// Number of calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.journal.calls.lock().len()
    }
}

#[async_trait]
impl ContractGenerator for FakeContractGenerator {
    async fn generate(&self, component: &Component) -> Result<(), CollaboratorError> {
        self.journal.record(component)
    }
}

/// An integration runner returning canned stats.
#[derive(Debug)]
pub struct FakeIntegrationRunner {
    outcome: Result<IntegrationStats, CollaboratorError>,
    calls: AtomicUsize,
}

impl FakeIntegrationRunner {
    /// Returns the given stats.
    #[must_use]
    pub fn new(stats: IntegrationStats) -> Self {
        Self {
            outcome: Ok(stats),
            calls: AtomicUsize::new(0),
        }
    }

    /// Every one of `total` tests runs and passes.
    #[must_use]
    pub fn passing(total: u64) -> Self {
        Self::new(IntegrationStats::new(total, total, 0))
    }

    /// The runner itself errors.
    #[must_use]
    pub fn erroring(message: impl Into<String>) -> Self {
        Self {
            outcome: Err(CollaboratorError::failed(message)),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of runs.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for FakeIntegrationRunner {
    fn default() -> Self {
        Self::passing(10)
    }
}

#[async_trait]
impl IntegrationTestRunner for FakeIntegrationRunner {
    async fn run(&self) -> Result<IntegrationStats, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}

/// A quality checker with per-component canned reports.
#[derive(Debug)]
pub struct FakeQualityChecker {
    default_report: QualityReport,
    reports: HashMap<String, Result<QualityReport, CollaboratorError>>,
    calls: Mutex<Vec<String>>,
}

impl FakeQualityChecker {
    /// Every component passes at 100% coverage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            default_report: QualityReport::passing(100.0),
            reports: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Returns a specific report for one component.
    #[must_use]
    pub fn with_report(mut self, component: impl Into<String>, report: QualityReport) -> Self {
        self.reports.insert(component.into(), Ok(report));
        self
    }

    /// The check errors for one component.
    #[must_use]
    pub fn erroring(mut self, component: impl Into<String>, message: impl Into<String>) -> Self {
        self.reports
            .insert(component.into(), Err(CollaboratorError::failed(message)));
        self
    }

    /// Component names in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

impl Default for FakeQualityChecker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QualityChecker for FakeQualityChecker {
    async fn check(&self, component: &Component) -> Result<QualityReport, CollaboratorError> {
        self.calls.lock().push(component.name.clone());
        self.reports
            .get(&component.name)
            .cloned()
            .unwrap_or_else(|| Ok(self.default_report.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ComponentCategory, ComponentStatus};

    fn component(name: &str) -> Component {
        Component::new(name, ComponentCategory::Feature)
    }

    #[tokio::test]
    async fn test_fake_worker_scripts() {
        let worker = FakeWorker::new().failing("b", "bad").erroring("c", "crash");
        let cancel = CancellationToken::new();

        let a = worker.build(&component("a"), &cancel).await.unwrap();
        let b = worker.build(&component("b"), &cancel).await.unwrap();
        let c = worker.build(&component("c"), &cancel).await;

        assert_eq!(a.status, ComponentStatus::Succeeded);
        assert_eq!(b.status, ComponentStatus::Failed);
        assert!(c.is_err());
        assert_eq!(worker.calls(), vec!["a", "b", "c"]);
        assert_eq!(worker.peak_concurrency(), 1);
    }

    #[tokio::test]
    async fn test_fake_scaffolder_fails_on_named_component() {
        let scaffolder = FakeScaffolder::new().failing_on("dom_domain", "disk full");

        assert!(scaffolder.scaffold(&component("cdp_types")).await.is_ok());
        let err = scaffolder.scaffold(&component("dom_domain")).await.unwrap_err();

        assert_eq!(err.to_string(), "disk full");
        assert_eq!(scaffolder.call_count(), 2);
    }

    #[tokio::test]
    async fn test_fake_quality_checker_overrides() {
        let checker = FakeQualityChecker::new().with_report(
            "network_domain",
            QualityReport {
                coverage_pct: 40.0,
                ..QualityReport::passing(0.0)
            },
        );

        let report = checker.check(&component("network_domain")).await.unwrap();
        assert!((report.coverage_pct - 40.0).abs() < f64::EPSILON);
        let default = checker.check(&component("other")).await.unwrap();
        assert!((default.coverage_pct - 100.0).abs() < f64::EPSILON);
    }
}
