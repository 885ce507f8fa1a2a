//! Page write operations: add, save extraction, record failure, requeue, remove.

use anyhow::Result;

use super::super::db::{unix_timestamp, PageDb};
use super::super::types::{Extraction, PageId, PageState};

impl PageDb {
    /// Insert a pending page. Adding a URL that is already stored returns the existing id.
    pub async fn add_page(&self, url: &str) -> Result<PageId> {
        let now = unix_timestamp();
        sqlx::query(
            r#"
            INSERT INTO pages (url, state, attempts, created_at, updated_at)
            VALUES (?1, ?2, 0, ?3, ?3)
            ON CONFLICT(url) DO NOTHING
            "#,
        )
        .bind(url)
        .bind(PageState::Pending.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?;

        let id: i64 = sqlx::query_scalar("SELECT id FROM pages WHERE url = ?1")
            .bind(url)
            .fetch_one(&self.pool)
            .await?;
        Ok(id)
    }

    /// Store an extraction and mark the page done. Returns the extraction id.
    pub async fn save_extraction(&self, page_id: PageId, extraction: &Extraction) -> Result<i64> {
        let now = unix_timestamp();
        let data_json = serde_json::to_string(&extraction.data)?;
        let mut tx = self.pool.begin().await?;

        let extraction_id = sqlx::query(
            r#"
            INSERT INTO extractions (page_id, data_json, created_at)
            VALUES (?1, ?2, ?3)
            "#,
        )
        .bind(page_id)
        .bind(data_json)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        sqlx::query(
            r#"
            UPDATE pages
            SET state = ?1,
                attempts = attempts + 1,
                last_attempt_at = ?2,
                last_error = NULL,
                updated_at = ?2
            WHERE id = ?3
            "#,
        )
        .bind(PageState::Done.as_str())
        .bind(now)
        .bind(page_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(extraction_id)
    }

    /// Mark the page failed and remember why.
    pub async fn record_failure(&self, page_id: PageId, message: &str) -> Result<()> {
        let now = unix_timestamp();
        sqlx::query(
            r#"
            UPDATE pages
            SET state = ?1,
                attempts = attempts + 1,
                last_attempt_at = ?2,
                last_error = ?3,
                updated_at = ?2
            WHERE id = ?4
            "#,
        )
        .bind(PageState::Failed.as_str())
        .bind(now)
        .bind(message)
        .bind(page_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Put every failed page back to pending. Returns the number of pages reset.
    pub async fn requeue_failed(&self) -> Result<u64> {
        let now = unix_timestamp();
        let r = sqlx::query(
            r#"
            UPDATE pages
            SET state = 'pending',
                updated_at = ?1
            WHERE state = 'failed'
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(r.rows_affected())
    }

    /// Permanently remove a page and its extractions. Returns false for unknown ids.
    pub async fn remove_page(&self, id: PageId) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM extractions WHERE page_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let r = sqlx::query("DELETE FROM pages WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(r.rows_affected() > 0)
    }
}
