//! Worker retries with configurable backoff and jitter.
//!
//! Retrying is a property of the worker, never of the pipeline: the pipeline
//! only ever sees the final result of a [`RetryingWorker`].

use super::Worker;
use crate::cancellation::CancellationToken;
use crate::core::ComponentResult;
use crate::errors::CollaboratorError;
use crate::graph::Component;
use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Backoff strategy for retry delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// delay = base * 2^attempt
    #[default]
    Exponential,
    /// delay = base * (attempt + 1)
    Linear,
    /// delay = base
    Constant,
}

/// Jitter strategy applied on top of the backoff delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterStrategy {
    /// No jitter
    None,
    /// Random from 0 to delay
    #[default]
    Full,
    /// Half fixed, half random
    Equal,
}

/// Configuration for worker retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum attempts including the first. 1 disables retries.
    pub max_attempts: u32,
    /// Base delay between attempts in milliseconds.
    pub base_delay_ms: u64,
    /// Maximum delay cap in milliseconds.
    pub max_delay_ms: u64,
    /// Backoff strategy.
    pub backoff_strategy: BackoffStrategy,
    /// Jitter strategy.
    pub jitter_strategy: JitterStrategy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            backoff_strategy: BackoffStrategy::Exponential,
            jitter_strategy: JitterStrategy::Full,
        }
    }
}

impl RetryConfig {
    /// Creates a new retry config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the base delay.
    #[must_use]
    pub fn with_base_delay_ms(mut self, delay: u64) -> Self {
        self.base_delay_ms = delay;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub fn with_max_delay_ms(mut self, delay: u64) -> Self {
        self.max_delay_ms = delay;
        self
    }

    /// Sets the backoff strategy.
    #[must_use]
    pub fn with_backoff(mut self, strategy: BackoffStrategy) -> Self {
        self.backoff_strategy = strategy;
        self
    }

    /// Sets the jitter strategy.
    #[must_use]
    pub fn with_jitter(mut self, strategy: JitterStrategy) -> Self {
        self.jitter_strategy = strategy;
        self
    }

    /// Returns true if more than one attempt is allowed.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.max_attempts > 1
    }

    /// Delay before the retry following the zero-indexed `attempt`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.base_delay_ms;
        let max = self.max_delay_ms;

        let delay = match self.backoff_strategy {
            BackoffStrategy::Exponential => base.saturating_mul(2u64.saturating_pow(attempt)),
            BackoffStrategy::Linear => base.saturating_mul(u64::from(attempt) + 1),
            BackoffStrategy::Constant => base,
        }
        .min(max);

        let jittered = match self.jitter_strategy {
            JitterStrategy::None => delay,
            JitterStrategy::Full => {
                if delay == 0 {
                    0
                } else {
                    rand::thread_rng().gen_range(0..=delay)
                }
            }
            JitterStrategy::Equal => {
                let half = delay / 2;
                if half == 0 {
                    delay
                } else {
                    half + rand::thread_rng().gen_range(0..=half)
                }
            }
        };

        Duration::from_millis(jittered)
    }
}

/// Decorator retrying a failing worker.
pub struct RetryingWorker {
    inner: Arc<dyn Worker>,
    config: RetryConfig,
}

impl RetryingWorker {
    /// Wraps a worker.
    #[must_use]
    pub fn new(inner: Arc<dyn Worker>, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

impl std::fmt::Debug for RetryingWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryingWorker")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Worker for RetryingWorker {
    async fn build(
        &self,
        component: &Component,
        cancel: &CancellationToken,
    ) -> Result<ComponentResult, CollaboratorError> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let result = match self.inner.build(component, cancel).await {
                Ok(result) => result,
                Err(err @ CollaboratorError::Cancelled(_)) => return Err(err),
                Err(err) => ComponentResult::failed(&component.name, err.to_string()),
            }
            .with_attempts(attempt);

            if !result.is_failure() || attempt >= max_attempts || cancel.is_cancelled() {
                return Ok(result);
            }

            let delay = self.config.delay_for_attempt(attempt - 1);
            warn!(
                component = %component.name,
                attempt,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = result.diagnostic.as_deref().unwrap_or(""),
                "Worker attempt failed, retrying"
            );

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = cancel.cancelled() => return Ok(result),
            }
        }
    }
}
