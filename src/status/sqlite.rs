//! SQLite-backed status store

use crate::status::{ExecutionStatus, StatusStore};
use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::PathBuf;
use std::str::FromStr;

/// SQLite status store
///
/// Each record is kept as a JSON snapshot alongside the columns used for
/// filtering and ordering.
pub struct SqliteStatusStore {
    pool: SqlitePool,
}

impl SqliteStatusStore {
    /// Open (or create) a store at `db_path`; `:memory:` gives a private in-memory database
    pub async fn new(db_path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path))
            .context("Invalid database path")?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        let store = Self { pool };
        store.init().await?;

        Ok(store)
    }

    /// Default database location under the user's local data directory
    pub fn default_path() -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        let db_dir = data_dir.join("storyloom");
        std::fs::create_dir_all(&db_dir)
            .with_context(|| format!("Failed to create {}", db_dir.display()))?;
        Ok(db_dir.join("status.db"))
    }

    /// Create store with default path
    pub async fn with_default_path() -> Result<Self> {
        let db_path = Self::default_path()?;
        let db_path = db_path
            .to_str()
            .context("Database path is not valid UTF-8")?
            .to_string();
        Self::new(&db_path).await
    }

    /// Initialize database schema
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS execution_status (
                request_id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                pipeline_id TEXT,
                state TEXT NOT NULL,
                progress INTEGER NOT NULL DEFAULT 0,
                updated_at TEXT NOT NULL,
                snapshot TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_status_project ON execution_status(project_id)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_status_updated ON execution_status(updated_at)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Fixed-width UTC timestamps so text ordering matches time ordering
    fn timestamp(dt: DateTime<Utc>) -> String {
        dt.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn decode(row: &sqlx::sqlite::SqliteRow) -> Result<ExecutionStatus> {
        let snapshot: String = row.get("snapshot");
        serde_json::from_str(&snapshot).context("Corrupt status snapshot")
    }
}

#[async_trait::async_trait]
impl StatusStore for SqliteStatusStore {
    async fn load(&self, request_id: &str) -> Result<Option<ExecutionStatus>> {
        let row = sqlx::query("SELECT snapshot FROM execution_status WHERE request_id = ?1")
            .bind(request_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load status")?;

        row.as_ref().map(Self::decode).transpose()
    }

    async fn save(&self, status: &ExecutionStatus) -> Result<()> {
        let snapshot = serde_json::to_string(status)?;
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO execution_status
            (request_id, project_id, pipeline_id, state, progress, updated_at, snapshot)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&status.request_id)
        .bind(&status.project_id)
        .bind(&status.pipeline_id)
        .bind(status.state.as_str())
        .bind(status.progress as i64)
        .bind(Self::timestamp(status.updated_at))
        .bind(snapshot)
        .execute(&self.pool)
        .await
        .context("Failed to save status")?;

        Ok(())
    }

    async fn remove(&self, request_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM execution_status WHERE request_id = ?1")
            .bind(request_id)
            .execute(&self.pool)
            .await
            .context("Failed to delete status")?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, project_id: Option<&str>, limit: usize) -> Result<Vec<ExecutionStatus>> {
        let rows = sqlx::query(
            r#"
            SELECT snapshot
            FROM execution_status
            WHERE ?1 IS NULL OR project_id = ?1
            ORDER BY updated_at DESC
            LIMIT ?2
            "#,
        )
        .bind(project_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list statuses")?;

        rows.iter().map(Self::decode).collect()
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let result = sqlx::query("DELETE FROM execution_status WHERE updated_at < ?1")
            .bind(Self::timestamp(cutoff))
            .execute(&self.pool)
            .await
            .context("Failed to purge statuses")?;

        Ok(result.rows_affected() as usize)
    }
}
