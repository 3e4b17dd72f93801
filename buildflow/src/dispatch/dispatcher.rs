//! Bounded-parallel execution of one build level.

use crate::cancellation::CancellationToken;
use crate::collaborators::Worker;
use crate::core::ComponentResult;
use crate::errors::CollaboratorError;
use crate::events::{EventSink, NoOpEventSink, COMPONENT_COMPLETED, COMPONENT_STARTED};
use crate::graph::Component;
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::{AbortHandle, JoinError, JoinHandle};
use tracing::{debug, info, warn};

/// Results of one dispatched level.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelOutcome {
    /// The level index.
    pub level: usize,
    /// Exactly one result per input component, in input order.
    pub results: Vec<ComponentResult>,
    /// True if cancellation stopped the level before every component ran.
    pub interrupted: bool,
}

impl LevelOutcome {
    /// Names of failed components, in input order.
    #[must_use]
    pub fn failed_names(&self) -> Vec<String> {
        self.results
            .iter()
            .filter(|r| r.is_failure())
            .map(|r| r.component.clone())
            .collect()
    }

    /// Returns true if any component failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.results.iter().any(ComponentResult::is_failure)
    }

    /// Returns the result for a component.
    #[must_use]
    pub fn result(&self, name: &str) -> Option<&ComponentResult> {
        self.results.iter().find(|r| r.component == name)
    }

    /// Returns the results keyed by component name.
    #[must_use]
    pub fn to_map(&self) -> HashMap<String, ComponentResult> {
        self.results
            .iter()
            .map(|r| (r.component.clone(), r.clone()))
            .collect()
    }
}

/// Runs the components of one level with at most `concurrency_limit`
/// workers in flight.
///
/// A new component is admitted as soon as any in-flight one finishes. The
/// dispatcher never halts on failure; the caller inspects the outcome.
pub struct BoundedDispatcher {
    concurrency_limit: usize,
    component_timeout: Option<Duration>,
    cancel: Arc<CancellationToken>,
    events: Arc<dyn EventSink>,
}

impl BoundedDispatcher {
    /// Creates a dispatcher. A limit of zero is raised to one.
    #[must_use]
    pub fn new(concurrency_limit: usize) -> Self {
        Self {
            concurrency_limit: concurrency_limit.max(1),
            component_timeout: None,
            cancel: Arc::new(CancellationToken::new()),
            events: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the per-component time limit.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.component_timeout = timeout;
        self
    }

    /// Shares the run's cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: Arc<CancellationToken>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Returns the concurrency limit.
    #[must_use]
    pub fn concurrency_limit(&self) -> usize {
        self.concurrency_limit
    }

    /// Runs every component of a level and returns one result per component.
    pub async fn run_level(
        &self,
        level: usize,
        components: &[Component],
        worker: Arc<dyn Worker>,
    ) -> LevelOutcome {
        let mut queue: VecDeque<Component> = components.iter().cloned().collect();
        let mut in_flight = FuturesUnordered::new();
        let mut abort_handles: HashMap<String, AbortHandle> = HashMap::new();
        let mut results: HashMap<String, ComponentResult> = HashMap::with_capacity(components.len());
        let mut interrupted = false;

        debug!(
            level,
            components = components.len(),
            limit = self.concurrency_limit,
            "Dispatching level"
        );

        loop {
            if !interrupted && self.cancel.is_cancelled() {
                interrupted = true;
                warn!(
                    level,
                    in_flight = abort_handles.len(),
                    queued = queue.len(),
                    "Cancellation observed, aborting level"
                );
                for handle in abort_handles.values() {
                    handle.abort();
                }
            }

            if !interrupted {
                while in_flight.len() < self.concurrency_limit {
                    let Some(component) = queue.pop_front() else {
                        break;
                    };
                    let name = component.name.clone();
                    let handle = self.spawn_component(level, component, worker.clone());
                    abort_handles.insert(name.clone(), handle.abort_handle());
                    in_flight.push(track(name, handle));
                }
            }

            if in_flight.is_empty() {
                break;
            }

            tokio::select! {
                biased;
                () = self.cancel.cancelled(), if !interrupted => {}
                Some((name, joined)) = in_flight.next() => {
                    abort_handles.remove(&name);
                    let result = self.join_result(&name, joined);
                    info!(
                        component = %name,
                        level,
                        status = %result.status,
                        duration_ms = result.duration_ms,
                        "Component finished"
                    );
                    self.events.try_emit(
                        COMPONENT_COMPLETED,
                        Some(serde_json::json!({
                            "component": &name,
                            "level": level,
                            "status": result.status,
                            "duration_ms": result.duration_ms,
                            "diagnostic": &result.diagnostic,
                        })),
                    );
                    results.insert(name, result);
                }
                else => break,
            }
        }

        let reason = self.cancel.reason_or_default();
        for component in queue {
            results.insert(
                component.name.clone(),
                ComponentResult::skipped(&component.name, format!("not started: {reason}")),
            );
        }

        let results = components
            .iter()
            .map(|c| {
                results.remove(&c.name).unwrap_or_else(|| {
                    ComponentResult::skipped(&c.name, format!("not started: {reason}"))
                })
            })
            .collect();

        LevelOutcome {
            level,
            results,
            interrupted,
        }
    }

    fn join_result(&self, name: &str, joined: Result<ComponentResult, JoinError>) -> ComponentResult {
        match joined {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => ComponentResult::skipped(
                name,
                format!("cancelled: {}", self.cancel.reason_or_default()),
            ),
            Err(e) => {
                warn!(component = %name, error = %e, "Worker task panicked");
                ComponentResult::failed(name, format!("worker panicked: {e}")).with_attempts(1)
            }
        }
    }

    fn spawn_component(
        &self,
        level: usize,
        component: Component,
        worker: Arc<dyn Worker>,
    ) -> JoinHandle<ComponentResult> {
        let cancel = self.cancel.clone();
        let events = self.events.clone();
        let timeout = self.component_timeout;

        tokio::spawn(async move {
            let name = component.name.clone();
            events.try_emit(
                COMPONENT_STARTED,
                Some(serde_json::json!({ "component": &name, "level": level })),
            );
            let start = Instant::now();

            let outcome = match timeout {
                Some(limit) => tokio::time::timeout(limit, worker.build(&component, &cancel))
                    .await
                    .unwrap_or(Err(CollaboratorError::TimedOut { limit })),
                None => worker.build(&component, &cancel).await,
            };
            let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

            let result = match outcome {
                Ok(mut result) => {
                    result.component.clone_from(&name);
                    if result.attempts == 0 {
                        result.attempts = 1;
                    }
                    result
                }
                Err(CollaboratorError::Cancelled(reason)) => {
                    ComponentResult::skipped(&name, format!("cancelled: {reason}")).with_attempts(1)
                }
                Err(err) => ComponentResult::failed(&name, err.to_string()).with_attempts(1),
            };
            result.with_duration_ms(duration_ms)
        })
    }
}

impl std::fmt::Debug for BoundedDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedDispatcher")
            .field("concurrency_limit", &self.concurrency_limit)
            .field("component_timeout", &self.component_timeout)
            .finish_non_exhaustive()
    }
}

fn track(
    name: String,
    handle: JoinHandle<ComponentResult>,
) -> impl Future<Output = (String, Result<ComponentResult, JoinError>)> {
    async move { (name, handle.await) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ComponentCategory, ComponentStatus};
    use crate::events::CollectingEventSink;
    use crate::testing::FakeWorker;

    fn level_of(names: &[&str]) -> Vec<Component> {
        names
            .iter()
            .map(|n| Component::new(*n, ComponentCategory::Feature))
            .collect()
    }

    #[tokio::test]
    async fn test_never_exceeds_limit() {
        let worker = Arc::new(FakeWorker::new().with_delay(Duration::from_millis(20)));
        let components = level_of(&["a", "b", "c", "d", "e", "f", "g"]);

        let outcome = BoundedDispatcher::new(3)
            .run_level(0, &components, worker.clone())
            .await;

        assert_eq!(outcome.results.len(), 7);
        assert!(outcome.results.iter().all(ComponentResult::is_success));
        assert!(worker.peak_concurrency() <= 3);
        assert_eq!(worker.peak_concurrency(), 3);
        assert_eq!(worker.call_count(), 7);
    }

    #[tokio::test]
    async fn test_results_in_input_order() {
        let worker = Arc::new(
            FakeWorker::new()
                .with_delay(Duration::from_millis(1))
                .slow("first", Duration::from_millis(40)),
        );
        let components = level_of(&["first", "second", "third"]);

        let outcome = BoundedDispatcher::new(3).run_level(0, &components, worker).await;

        let names: Vec<_> = outcome.results.iter().map(|r| r.component.as_str()).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_admission_on_completion() {
        // One slow component must not hold back the rest of the queue.
        let worker = Arc::new(
            FakeWorker::new()
                .with_delay(Duration::from_millis(5))
                .slow("slow", Duration::from_millis(150)),
        );
        let components = level_of(&["slow", "a", "b", "c", "d"]);
        let start = Instant::now();

        let outcome = BoundedDispatcher::new(2).run_level(0, &components, worker).await;

        assert!(!outcome.has_failures());
        assert!(start.elapsed() < Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_failure_and_error_do_not_stop_siblings() {
        let worker = Arc::new(
            FakeWorker::new()
                .failing("b", "compile error")
                .erroring("c", "worker crashed"),
        );
        let components = level_of(&["a", "b", "c", "d"]);

        let outcome = BoundedDispatcher::new(2).run_level(1, &components, worker.clone()).await;

        assert_eq!(outcome.failed_names(), vec!["b", "c"]);
        assert_eq!(outcome.result("a").unwrap().status, ComponentStatus::Succeeded);
        assert_eq!(outcome.result("d").unwrap().status, ComponentStatus::Succeeded);
        assert!(outcome
            .result("c")
            .unwrap()
            .diagnostic
            .as_deref()
            .unwrap()
            .contains("worker crashed"));
        assert_eq!(worker.call_count(), 4);
    }

    #[tokio::test]
    async fn test_panic_becomes_failed_result() {
        let worker = Arc::new(FakeWorker::new().panicking("boom"));
        let components = level_of(&["ok", "boom"]);

        let outcome = BoundedDispatcher::new(2).run_level(0, &components, worker).await;

        let result = outcome.result("boom").unwrap();
        assert_eq!(result.status, ComponentStatus::Failed);
        assert!(result.diagnostic.as_deref().unwrap().contains("panicked"));
        assert!(outcome.result("ok").unwrap().is_success());
    }

    #[tokio::test]
    async fn test_timeout_becomes_failed_result() {
        let worker = Arc::new(FakeWorker::new().hanging("stuck"));
        let components = level_of(&["stuck", "quick"]);

        let outcome = BoundedDispatcher::new(2)
            .with_timeout(Some(Duration::from_millis(30)))
            .run_level(0, &components, worker)
            .await;

        let stuck = outcome.result("stuck").unwrap();
        assert_eq!(stuck.status, ComponentStatus::Failed);
        assert!(stuck.diagnostic.as_deref().unwrap().contains("Timed out"));
        assert!(outcome.result("quick").unwrap().is_success());
        assert!(!outcome.interrupted);
    }

    #[tokio::test]
    async fn test_cancellation_accounts_for_every_component() {
        let worker = Arc::new(FakeWorker::new().with_delay(Duration::from_millis(500)));
        let cancel = Arc::new(CancellationToken::new());
        let components = level_of(&["a", "b", "c", "d", "e"]);
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            canceller.cancel("interrupted by user");
        });

        let outcome = BoundedDispatcher::new(2)
            .with_cancellation(cancel)
            .run_level(0, &components, worker.clone())
            .await;

        assert!(outcome.interrupted);
        assert_eq!(outcome.results.len(), 5);
        assert!(outcome
            .results
            .iter()
            .all(|r| r.status == ComponentStatus::Skipped));
        assert_eq!(worker.call_count(), 2);
    }

    #[tokio::test]
    async fn test_pre_cancelled_level_runs_nothing() {
        let worker = Arc::new(FakeWorker::new());
        let cancel = Arc::new(CancellationToken::new());
        cancel.cancel("shutdown");

        let outcome = BoundedDispatcher::new(4)
            .with_cancellation(cancel)
            .run_level(0, &level_of(&["a", "b"]), worker.clone())
            .await;

        assert!(outcome.interrupted);
        assert_eq!(worker.call_count(), 0);
        assert!(outcome.results.iter().all(|r| r.attempts == 0));
    }

    #[tokio::test]
    async fn test_emits_component_events() {
        let sink = Arc::new(CollectingEventSink::new());
        let outcome = BoundedDispatcher::new(1)
            .with_event_sink(sink.clone())
            .run_level(0, &level_of(&["a", "b"]), Arc::new(FakeWorker::new()))
            .await;

        assert!(!outcome.has_failures());
        assert_eq!(sink.events_of_type(COMPONENT_STARTED).len(), 2);
        assert_eq!(sink.events_of_type(COMPONENT_COMPLETED).len(), 2);
    }

    #[tokio::test]
    async fn test_zero_limit_is_raised_to_one() {
        let worker = Arc::new(FakeWorker::new().with_delay(Duration::from_millis(5)));
        let dispatcher = BoundedDispatcher::new(0);
        assert_eq!(dispatcher.concurrency_limit(), 1);

        dispatcher.run_level(0, &level_of(&["a", "b", "c"]), worker.clone()).await;
        assert_eq!(worker.peak_concurrency(), 1);
    }
}
