//! SQLite-backed page database.
//!
//! Connection setup and schema. Page CRUD lives in `pages`.

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::state_dir;

/// Handle to the page database at `~/.local/state/harvest/pages.db`
/// (or an explicit path). Cheap to clone; clones share one pool.
#[derive(Clone)]
pub struct PageDb {
    pub(crate) pool: Pool<Sqlite>,
}

impl std::fmt::Debug for PageDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageDb").finish_non_exhaustive()
    }
}

impl PageDb {
    pub async fn open_default() -> Result<Self> {
        Self::open_at(state_dir()?.join("pages.db")).await
    }

    /// Open (or create) the database file at `path`, creating parent directories.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let db = Self::connect(options, 8).await?;
        tracing::debug!(path = %path.display(), "page database opened");
        Ok(db)
    }

    async fn connect(options: SqliteConnectOptions, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        let db = PageDb { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        // `attempts` counts terminal outcomes (success or failure);
        // `last_attempt_at` stays NULL until a page is first processed.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL UNIQUE,
                state TEXT NOT NULL,
                attempts INTEGER NOT NULL DEFAULT 0,
                last_attempt_at INTEGER,
                last_error TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS extractions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                page_id INTEGER NOT NULL,
                data_json TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS extractions_page ON extractions(page_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

/// Unix seconds for DB timestamps.
pub(crate) fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// In-memory database for tests. One connection, since each in-memory
/// connection is its own database.
#[cfg(test)]
pub(crate) async fn open_memory() -> Result<PageDb> {
    let options: SqliteConnectOptions = "sqlite::memory:".parse()?;
    PageDb::connect(options, 1).await
}
