//! Retry loop: run an async operation until success, a non-retryable
//! failure, exhausted attempts, or an open circuit.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::circuit::{CircuitRegistry, RunStatistics};
use crate::config::HarvestConfig;

use super::classify::{classify, ClassifyContext};
use super::error::ClassifiedError;
use super::policy::{RetryDecision, RetryPolicy};

/// Retry engine: a backoff policy plus the circuit registry it exclusively owns.
///
/// Shared with the batch coordinator behind an `Arc`; all state lives in the
/// registry, which guards its own counters.
#[derive(Debug)]
pub struct RetryEngine {
    policy: RetryPolicy,
    registry: CircuitRegistry,
}

impl RetryEngine {
    pub fn new(policy: RetryPolicy, registry: CircuitRegistry) -> Self {
        Self { policy, registry }
    }

    pub fn from_config(cfg: &HarvestConfig) -> Self {
        Self::new(
            RetryPolicy::from_config(&cfg.retry),
            CircuitRegistry::from_config(&cfg.circuit),
        )
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn registry(&self) -> &CircuitRegistry {
        &self.registry
    }

    /// Aggregate circuit statistics for everything this engine has seen.
    pub fn stats(&self) -> RunStatistics {
        self.registry.stats()
    }

    /// Run `operation` under `key`, retrying per policy.
    ///
    /// Every failure is classified before it is acted on; the returned error
    /// is the classification of the last attempt, or a circuit-open error if
    /// the breaker refused an attempt.
    pub async fn execute_with_retry<T, F, Fut>(
        &self,
        key: &str,
        context: &str,
        operation: F,
    ) -> Result<T, ClassifiedError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        self.run(key, context, None, operation).await
    }

    /// Like [`execute_with_retry`](Self::execute_with_retry), but an in-flight
    /// attempt or backoff wait is abandoned as soon as `cancel` fires.
    /// Cancellation is not counted against the key's circuit.
    pub async fn execute_with_cancel<T, F, Fut>(
        &self,
        key: &str,
        context: &str,
        cancel: &CancellationToken,
        operation: F,
    ) -> Result<T, ClassifiedError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        self.run(key, context, Some(cancel), operation).await
    }

    async fn run<T, F, Fut>(
        &self,
        key: &str,
        context: &str,
        cancel: Option<&CancellationToken>,
        mut operation: F,
    ) -> Result<T, ClassifiedError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let mut attempt = 1u32;
        loop {
            if cancel.is_some_and(|c| c.is_cancelled()) {
                return Err(ClassifiedError::cancelled(key, attempt));
            }

            // Consulted before every attempt, so a circuit opened elsewhere
            // during our backoff also stops this item.
            if self.registry.is_open(key) {
                tracing::warn!(key, attempt, context, "circuit open; skipping operation");
                return Err(ClassifiedError::circuit_open(key, attempt));
            }

            // A finished attempt wins over a cancellation that raced it, so
            // its outcome is still recorded.
            let outcome = match cancel {
                Some(token) => tokio::select! {
                    biased;
                    res = operation() => res,
                    _ = token.cancelled() => {
                        tracing::debug!(key, attempt, "attempt cancelled");
                        return Err(ClassifiedError::cancelled(key, attempt));
                    }
                },
                None => operation().await,
            };

            let err = match outcome {
                Ok(value) => {
                    self.registry.record_success(key);
                    if attempt > 1 {
                        tracing::info!(key, attempt, context, "succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            let classified = classify(
                &err,
                &ClassifyContext {
                    key,
                    attempt,
                    operation: context,
                },
            );
            self.registry.record_failure(key);

            let delay = match self.policy.decide(attempt, classified.retryable) {
                RetryDecision::NoRetry => {
                    tracing::warn!(
                        key,
                        attempt,
                        context,
                        kind = %classified.kind,
                        retryable = classified.retryable,
                        error = %classified.message,
                        "giving up"
                    );
                    return Err(classified);
                }
                RetryDecision::RetryAfter(d) => d,
            };

            tracing::debug!(
                key,
                attempt,
                context,
                kind = %classified.kind,
                delay_ms = delay.as_millis() as u64,
                error = %classified.message,
                "attempt failed; backing off"
            );

            match cancel {
                Some(token) => tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        return Err(ClassifiedError::cancelled(key, attempt));
                    }
                    _ = tokio::time::sleep(delay) => {}
                },
                None => tokio::time::sleep(delay).await,
            }
            attempt += 1;
        }
    }
}
