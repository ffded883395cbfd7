//! SQLite-backed job store (sqlx).
//!
//! The database file lives under the XDG state directory:
//! `~/.local/state/unidl/jobs.db`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use super::feed::{RowFeed, Subscription, SubscriptionId};
use super::types::{Format, JobId, JobInput, JobPatch, JobRow, JobStatus, JobSummary};
use super::JobStore;

const ROW_COLUMNS: &str = "id, original_url, platform, output_path, is_playlist, user_id, \
     status, available_formats, selected_format, last_log, progress, filename, full_path";

/// Percent-encode a path for use in a sqlite:// URI so spaces and special chars don't break parsing.
fn path_to_sqlite_uri(path: &Path) -> String {
    let s = path.to_string_lossy();
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '%' => out.push_str("%25"),
            ' ' => out.push_str("%20"),
            '#' => out.push_str("%23"),
            '?' => out.push_str("%3F"),
            '&' => out.push_str("%26"),
            c => out.push(c),
        }
    }
    format!("sqlite://{}", out)
}

/// Handle to the SQLite job store. Clones share the pool and the row feed.
#[derive(Clone)]
pub struct SqliteJobStore {
    pool: Pool<Sqlite>,
    feed: Arc<RowFeed>,
}

impl SqliteJobStore {
    /// Open (or create) the default store and run migrations.
    pub async fn open_default() -> Result<Self> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("unidl")?;
        let db_path = xdg_dirs.get_state_home().join("jobs.db");
        Self::open_at(db_path).await
    }

    /// Open (or create) the store at a specific path. Creates parent dirs if needed.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let uri = path_to_sqlite_uri(path) + "?mode=rwc";
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect(&uri)
            .await
            .with_context(|| format!("open job store at {}", path.display()))?;
        Self::from_pool(pool).await
    }

    /// Open an in-memory store. Single connection so every query sees the same DB.
    pub async fn open_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::from_pool(pool).await
    }

    async fn from_pool(pool: Pool<Sqlite>) -> Result<Self> {
        let store = SqliteJobStore {
            pool,
            feed: Arc::new(RowFeed::new()),
        };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        // - `available_formats` is a JSON array in the engine's format shape.
        // - `worker_claimed` is engine bookkeeping; the orchestrator never reads it.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS downloads (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                original_url TEXT NOT NULL,
                platform TEXT NOT NULL,
                output_path TEXT NOT NULL,
                is_playlist INTEGER NOT NULL DEFAULT 0,
                user_id TEXT,
                status TEXT NOT NULL,
                available_formats TEXT,
                selected_format TEXT,
                last_log TEXT,
                progress REAL,
                filename TEXT,
                full_path TEXT,
                worker_claimed INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Most recent jobs, newest first.
    pub async fn list_recent(&self, limit: u32) -> Result<Vec<JobSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT id, original_url, status, filename, created_at
            FROM downloads
            ORDER BY created_at DESC, id DESC
            LIMIT ?1
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let status: String = row.get("status");
            out.push(JobSummary {
                id: row.get("id"),
                url: row.get("original_url"),
                status: JobStatus::from_str(&status),
                filename: row.get("filename"),
                created_at: row.get("created_at"),
            });
        }
        Ok(out)
    }

    /// Claim `id` for processing if it is still an unclaimed `scanning` job.
    /// Returns false when another worker got it first or the job moved on.
    pub async fn claim_job(&self, id: JobId) -> Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE downloads
            SET worker_claimed = 1,
                updated_at = ?1
            WHERE id = ?2 AND worker_claimed = 0 AND status = 'scanning'
            "#,
        )
        .bind(unix_timestamp())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() == 1)
    }

    /// The push feed backing `subscribe`.
    pub fn feed(&self) -> &RowFeed {
        &self.feed
    }

    async fn fetch_row(&self, id: JobId) -> Result<Option<JobRow>> {
        let sql = format!("SELECT {ROW_COLUMNS} FROM downloads WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| decode_row(&r)).transpose()
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn insert(&self, input: &JobInput) -> Result<Option<JobId>> {
        let now = unix_timestamp();
        let row = sqlx::query(
            r#"
            INSERT INTO downloads (
                original_url, platform, output_path, is_playlist, user_id,
                status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            RETURNING id
            "#,
        )
        .bind(&input.url)
        .bind(input.platform.as_str())
        .bind(&input.desired_output_path)
        .bind(input.is_playlist_request)
        .bind(&input.requesting_user_id)
        .bind(JobStatus::Scanning.as_str())
        .bind(now)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.get::<i64, _>("id")))
    }

    async fn update(&self, id: JobId, patch: &JobPatch) -> Result<()> {
        let now = unix_timestamp();
        let formats_json = patch
            .available_formats
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let result = sqlx::query(
            r#"
            UPDATE downloads
            SET status = COALESCE(?1, status),
                available_formats = COALESCE(?2, available_formats),
                selected_format = COALESCE(?3, selected_format),
                last_log = COALESCE(?4, last_log),
                progress = COALESCE(?5, progress),
                filename = COALESCE(?6, filename),
                full_path = COALESCE(?7, full_path),
                updated_at = ?8
            WHERE id = ?9
            "#,
        )
        .bind(patch.status.map(JobStatus::as_str))
        .bind(formats_json)
        .bind(&patch.selected_format)
        .bind(&patch.last_log)
        .bind(patch.progress)
        .bind(&patch.filename)
        .bind(&patch.full_path)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            anyhow::bail!("job {} not found", id);
        }

        if let Some(row) = self.fetch_row(id).await? {
            let reached = self.feed.publish(&row);
            tracing::trace!(job_id = id, reached, "row update published");
        }
        Ok(())
    }

    async fn read_one(&self, id: JobId) -> Result<JobRow> {
        self.fetch_row(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("job {} not found", id))
    }

    fn subscribe(&self, id: JobId) -> Result<Subscription> {
        Ok(self.feed.subscribe(id))
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.feed.unsubscribe(id);
    }
}

fn decode_row(row: &SqliteRow) -> Result<JobRow> {
    let status: String = row.get("status");
    let formats_json: Option<String> = row.get("available_formats");
    let available_formats = formats_json
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(serde_json::from_str::<Vec<Format>>)
        .transpose()
        .context("decode available_formats")?;

    Ok(JobRow {
        id: row.get("id"),
        url: row.get("original_url"),
        platform: row.get("platform"),
        output_path: row.get("output_path"),
        is_playlist: row.get("is_playlist"),
        user_id: row.get("user_id"),
        status: JobStatus::from_str(&status),
        available_formats,
        selected_format: row.get("selected_format"),
        last_log: row.get("last_log"),
        progress: row.get("progress"),
        filename: row.get("filename"),
        full_path: row.get("full_path"),
    })
}

/// Current time as Unix seconds (for row timestamps).
fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
