//! Seams between the coordinator and its collaborators.

use async_trait::async_trait;

use super::result::WorkResult;

/// Per-item work: which circuit key an item runs under and the operation itself.
///
/// `process` is opaque to the coordinator; it may fail with any error and is
/// expected to bound its own duration.
#[async_trait]
pub trait BatchJob: Send + Sync {
    type Item: Clone + Send + Sync + 'static;
    type Output: Send + Sync + 'static;

    /// Circuit key for the item (normally the remote host).
    fn key(&self, item: &Self::Item) -> String;

    async fn process(&self, item: &Self::Item) -> anyhow::Result<Self::Output>;
}

/// Storage collaborator: completion lookups and result persistence.
#[async_trait]
pub trait ResultStore<I, T>: Send + Sync
where
    I: Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    /// True if the item already has a persisted result and must be skipped.
    async fn is_done(&self, item: &I) -> anyhow::Result<bool>;

    /// Persist a successful result; returns the stored record id.
    /// Called at most once per successful item per run.
    async fn persist(&self, result: &WorkResult<I, T>) -> anyhow::Result<i64>;

    /// Note a failed item (attempt bookkeeping). Does nothing by default.
    async fn record_failure(&self, _result: &WorkResult<I, T>) -> anyhow::Result<()> {
        Ok(())
    }
}
