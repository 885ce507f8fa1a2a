//! Windowed run loop.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::BatchConfig;
use crate::retry::{ClassifiedError, ErrorKind, RetryEngine};

use super::job::{BatchJob, ResultStore};
use super::result::{BatchReport, WorkResult};

/// Context label passed to the retry engine for every item.
pub const PROCESSING_CONTEXT: &str = "processing";

/// Runs items through a shared [`RetryEngine`] in windows of `concurrency`.
#[derive(Debug, Clone)]
pub struct BatchCoordinator {
    engine: Arc<RetryEngine>,
    concurrency: usize,
    inter_batch_pause: Duration,
}

impl BatchCoordinator {
    pub fn new(engine: Arc<RetryEngine>, concurrency: usize, inter_batch_pause: Duration) -> Self {
        Self {
            engine,
            concurrency: concurrency.max(1),
            inter_batch_pause,
        }
    }

    pub fn from_config(engine: Arc<RetryEngine>, cfg: &BatchConfig) -> Self {
        Self::new(
            engine,
            cfg.concurrency,
            Duration::from_secs_f64(cfg.inter_batch_pause_secs.max(0.0)),
        )
    }

    pub fn engine(&self) -> &Arc<RetryEngine> {
        &self.engine
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Process every item not already done and return one result per processed item.
    pub async fn run<J, S>(
        &self,
        job: Arc<J>,
        store: Arc<S>,
        items: Vec<J::Item>,
    ) -> BatchReport<J::Item, J::Output>
    where
        J: BatchJob + 'static,
        S: ResultStore<J::Item, J::Output> + 'static,
    {
        self.run_with_cancel(job, store, items, CancellationToken::new())
            .await
    }

    /// Like [`run`](Self::run), but stops early once `cancel` fires: in-flight
    /// items fail fast, the inter-window pause is cut short, and no further
    /// windows start.
    pub async fn run_with_cancel<J, S>(
        &self,
        job: Arc<J>,
        store: Arc<S>,
        items: Vec<J::Item>,
        cancel: CancellationToken,
    ) -> BatchReport<J::Item, J::Output>
    where
        J: BatchJob + 'static,
        S: ResultStore<J::Item, J::Output> + 'static,
    {
        let total = items.len();
        let pending = pending_items::<J::Item, J::Output, S>(store.as_ref(), items).await;
        let skipped_done = total - pending.len();
        let windows = pending.len().div_ceil(self.concurrency);
        tracing::info!(
            total,
            pending = pending.len(),
            skipped_done,
            windows,
            concurrency = self.concurrency,
            "batch run starting"
        );

        let mut results = Vec::with_capacity(pending.len());
        let mut cancelled = false;
        for (index, window) in pending.chunks(self.concurrency).enumerate() {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let window_results = self.run_window(&job, &store, window, &cancel).await;
            let ok = window_results.iter().filter(|r| r.is_success()).count();
            tracing::info!(
                window = index + 1,
                windows,
                succeeded = ok,
                failed = window_results.len() - ok,
                "window settled"
            );
            results.extend(window_results);

            if index + 1 < windows && !self.inter_batch_pause.is_zero() {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        cancelled = true;
                        break;
                    }
                    _ = tokio::time::sleep(self.inter_batch_pause) => {}
                }
            }
        }
        cancelled |= cancel.is_cancelled();

        let report = BatchReport {
            results,
            stats: self.engine.stats(),
            skipped_done,
            cancelled,
        };
        tracing::info!(
            processed = report.results.len(),
            succeeded = report.succeeded(),
            failed = report.failed(),
            open_circuits = report.stats.open_circuits,
            cancelled,
            "batch run finished"
        );
        report
    }

    /// Launch every item of the window at once and wait for all of them.
    async fn run_window<J, S>(
        &self,
        job: &Arc<J>,
        store: &Arc<S>,
        window: &[J::Item],
        cancel: &CancellationToken,
    ) -> Vec<WorkResult<J::Item, J::Output>>
    where
        J: BatchJob + 'static,
        S: ResultStore<J::Item, J::Output> + 'static,
    {
        let handles: Vec<_> = window
            .iter()
            .map(|item| {
                let engine = Arc::clone(&self.engine);
                let job = Arc::clone(job);
                let store = Arc::clone(store);
                let cancel = cancel.clone();
                let task_item = item.clone();
                let handle = tokio::spawn(async move {
                    process_item(&engine, job.as_ref(), store.as_ref(), task_item, &cancel).await
                });
                (item, handle)
            })
            .collect();

        let mut out = Vec::with_capacity(handles.len());
        for (item, handle) in handles {
            match handle.await {
                Ok(result) => out.push(result),
                Err(join_err) => {
                    tracing::error!(error = %join_err, "batch worker task failed");
                    let key = job.key(item);
                    out.push(WorkResult::new(
                        item.clone(),
                        Err(worker_failed(&key, &join_err.to_string())),
                    ));
                }
            }
        }
        out
    }
}

/// Items whose `is_done` lookup is false. A failed lookup keeps the item.
async fn pending_items<I, T, S>(store: &S, items: Vec<I>) -> Vec<I>
where
    I: Send + Sync + 'static,
    T: Send + Sync + 'static,
    S: ResultStore<I, T> + ?Sized,
{
    let mut pending = Vec::with_capacity(items.len());
    for item in items {
        match store.is_done(&item).await {
            Ok(true) => {}
            Ok(false) => pending.push(item),
            Err(e) => {
                tracing::warn!(error = %format!("{e:#}"), "done lookup failed; processing item anyway");
                pending.push(item);
            }
        }
    }
    pending
}

/// One item: retry-wrapped operation, then immediate persistence or failure bookkeeping.
async fn process_item<J, S>(
    engine: &RetryEngine,
    job: &J,
    store: &S,
    item: J::Item,
    cancel: &CancellationToken,
) -> WorkResult<J::Item, J::Output>
where
    J: BatchJob + ?Sized,
    S: ResultStore<J::Item, J::Output> + ?Sized,
{
    let key = job.key(&item);
    let outcome = engine
        .execute_with_cancel(&key, PROCESSING_CONTEXT, cancel, || job.process(&item))
        .await;
    let result = WorkResult::new(item, outcome);

    match &result.outcome {
        Ok(_) => match store.persist(&result).await {
            Ok(id) => tracing::debug!(key = %key, id, "result persisted"),
            Err(e) => {
                tracing::warn!(key = %key, error = %format!("{e:#}"), "persisting result failed; keeping success")
            }
        },
        Err(err) if err.kind == ErrorKind::Cancelled => {
            // Cancelled items keep whatever state the store already had.
            tracing::debug!(key = %key, attempt = err.attempt, "item cancelled");
        }
        Err(err) => {
            tracing::warn!(
                key = %key,
                kind = %err.kind,
                attempt = err.attempt,
                error = %err.message,
                "item failed"
            );
            if let Err(e) = store.record_failure(&result).await {
                tracing::warn!(key = %key, error = %format!("{e:#}"), "recording failure failed");
            }
        }
    }
    result
}

fn worker_failed(key: &str, detail: &str) -> ClassifiedError {
    ClassifiedError {
        kind: ErrorKind::Unknown,
        message: format!("worker task failed: {detail}"),
        cause: None,
        attempt: 1,
        key: key.to_string(),
        occurred_at: crate::retry::unix_millis(),
        retryable: false,
    }
}
