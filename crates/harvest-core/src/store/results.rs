//! The page database as the batch coordinator's result store.

use async_trait::async_trait;

use crate::batch::{ResultStore, WorkResult};

use super::db::PageDb;
use super::types::{Extraction, PageRecord};

#[async_trait]
impl ResultStore<PageRecord, Extraction> for PageDb {
    async fn is_done(&self, item: &PageRecord) -> anyhow::Result<bool> {
        PageDb::is_done(self, item.id).await
    }

    async fn persist(&self, result: &WorkResult<PageRecord, Extraction>) -> anyhow::Result<i64> {
        let Some(extraction) = result.data() else {
            anyhow::bail!("page {} has no extraction to persist", result.item.id);
        };
        self.save_extraction(result.item.id, extraction).await
    }

    async fn record_failure(&self, result: &WorkResult<PageRecord, Extraction>) -> anyhow::Result<()> {
        let Some(err) = result.error() else {
            return Ok(());
        };
        PageDb::record_failure(self, result.item.id, &err.to_string()).await
    }
}
