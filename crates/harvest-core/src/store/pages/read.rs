//! Page read operations: list, get, pending, latest extraction.

use anyhow::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::config::RetryOrder;

use super::super::db::PageDb;
use super::super::types::{PageDetails, PageId, PageRecord, PageState, PageSummary, StoredExtraction};

fn details_from_row(row: &SqliteRow) -> PageDetails {
    let state_str: String = row.get("state");
    PageDetails {
        id: row.get("id"),
        url: row.get("url"),
        state: PageState::from_str(&state_str),
        attempts: row.get("attempts"),
        last_attempt_at: row.get("last_attempt_at"),
        last_error: row.get("last_error"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

impl PageDb {
    /// List all pages, oldest first.
    pub async fn list_pages(&self) -> Result<Vec<PageSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT id, url, state, attempts, last_error
            FROM pages
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let state_str: String = row.get("state");
            out.push(PageSummary {
                id: row.get("id"),
                url: row.get("url"),
                state: PageState::from_str(&state_str),
                attempts: row.get("attempts"),
                last_error: row.get("last_error"),
            });
        }
        Ok(out)
    }

    /// Fetch a single page row.
    pub async fn get_page(&self, id: PageId) -> Result<Option<PageDetails>> {
        let row = sqlx::query(
            r#"
            SELECT id, url, state, attempts, last_attempt_at, last_error, created_at, updated_at
            FROM pages
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(details_from_row))
    }

    /// Pages in the `pending` state, in the requested order. Ties break by id.
    ///
    /// Failed pages stay out of the queue until [`PageDb::requeue_failed`].
    pub async fn pending_pages(&self, order: RetryOrder) -> Result<Vec<PageRecord>> {
        let sql = match order {
            RetryOrder::NeverAttemptedFirst => {
                r#"
                SELECT id, url FROM pages
                WHERE state = 'pending'
                ORDER BY last_attempt_at IS NOT NULL, last_attempt_at ASC, id ASC
                "#
            }
            RetryOrder::NeverAttemptedLast => {
                r#"
                SELECT id, url FROM pages
                WHERE state = 'pending'
                ORDER BY last_attempt_at IS NULL, last_attempt_at ASC, id ASC
                "#
            }
        };
        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
        Ok(rows
            .into_iter()
            .map(|row| PageRecord {
                id: row.get("id"),
                url: row.get("url"),
            })
            .collect())
    }

    /// True once an extraction has been saved for the page. Unknown ids are not done.
    pub async fn is_done(&self, id: PageId) -> Result<bool> {
        let state: Option<String> = sqlx::query_scalar("SELECT state FROM pages WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(state.is_some_and(|s| PageState::from_str(&s) == PageState::Done))
    }

    /// Most recent extraction saved for the page.
    pub async fn latest_extraction(&self, page_id: PageId) -> Result<Option<StoredExtraction>> {
        let row = sqlx::query(
            r#"
            SELECT id, page_id, data_json, created_at
            FROM extractions
            WHERE page_id = ?1
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .bind(page_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let data_json: String = row.get("data_json");
        Ok(Some(StoredExtraction {
            id: row.get("id"),
            page_id: row.get("page_id"),
            data: serde_json::from_str(&data_json)?,
            created_at: row.get("created_at"),
        }))
    }
}
