//! Simulated download engine.
//!
//! Stands in for the external worker: claims the job it is pointed at,
//! publishes the formats it "found", waits for the user's selection, then
//! walks the job through fake progress to `completed` (or `failed` when
//! configured to). It only talks to the store, like an out-of-process worker.

use anyhow::{Context, Result};
use std::path::Path;
use std::time::Duration;

use crate::config::EngineConfig;
use crate::store::{Format, JobId, JobPatch, JobRow, JobStatus, JobStore, SqliteJobStore};
use crate::url_model;

/// Progress percentages reported after a selection.
const PROGRESS_STEPS: [f64; 5] = [12.5, 37.5, 62.5, 87.5, 100.0];

/// Formats offered when none are configured.
pub fn default_formats() -> Vec<Format> {
    vec![
        Format::new("18", "360p", "mp4").with_size("9.6 MiB"),
        Format::new("22", "720p", "mp4").with_size("24.1 MiB"),
        Format::new("137", "1080p", "mp4").with_size("48.3 MiB"),
        Format::new("313", "4K", "webm").with_size("212.0 MiB"),
    ]
}

pub struct SimulatedEngine {
    store: SqliteJobStore,
    step_delay: Duration,
    formats: Vec<Format>,
    failure: Option<String>,
}

impl SimulatedEngine {
    pub fn new(store: SqliteJobStore, cfg: &EngineConfig) -> Self {
        Self {
            store,
            step_delay: cfg.step_delay(),
            formats: default_formats(),
            failure: None,
        }
    }

    pub fn with_formats(mut self, formats: Vec<Format>) -> Self {
        self.formats = formats;
        self
    }

    /// Fail every job right after the selection with `reason` as the last log line.
    pub fn with_failure(mut self, reason: impl Into<String>) -> Self {
        self.failure = Some(reason.into());
        self
    }

    /// Claim and process `job_id`. Returns false if the job could not be
    /// claimed (missing, already claimed, or past `scanning`).
    ///
    /// A job whose processing errors is marked `failed` with the error text.
    pub async fn run_job(&self, job_id: JobId) -> Result<bool> {
        if !self.store.claim_job(job_id).await? {
            tracing::debug!(job_id, "job not claimable, skipping");
            return Ok(false);
        }
        if let Err(e) = self.process(job_id).await {
            tracing::warn!(job_id, "engine failed job: {:#}", e);
            let patch = JobPatch::status(JobStatus::Failed).with_log(format!("ERROR: {:#}", e));
            if self.store.update(job_id, &patch).await.is_err() {
                tracing::warn!(job_id, "could not record engine failure");
            }
        }
        Ok(true)
    }

    async fn process(&self, job_id: JobId) -> Result<()> {
        let row = self.store.read_one(job_id).await?;
        tracing::debug!(job_id, url = %row.url, "engine processing job");

        self.step().await;
        self.store
            .update(
                job_id,
                &JobPatch::default().with_log(format!("[{}] Extracting URL: {}", row.platform, row.url)),
            )
            .await?;

        self.step().await;
        self.store
            .update(
                job_id,
                &JobPatch::status(JobStatus::WaitingForSelection)
                    .with_formats(self.formats.clone())
                    .with_log(format!("Found {} formats", self.formats.len())),
            )
            .await?;

        let Some(format_id) = self.wait_for_selection(job_id).await? else {
            tracing::debug!(job_id, "job ended before a selection was made");
            return Ok(());
        };
        let format = self
            .formats
            .iter()
            .find(|f| f.format_id == format_id)
            .with_context(|| format!("selected format {format_id} was never offered"))?;

        let filename =
            url_model::derive_media_filename(&row.url, Some(&row.platform), &format.container);
        self.store
            .update(
                job_id,
                &JobPatch::status(JobStatus::Downloading)
                    .with_progress(0.0)
                    .with_log(format!("[download] Destination: {filename}")),
            )
            .await?;

        if let Some(ref reason) = self.failure {
            self.step().await;
            self.store
                .update(job_id, &JobPatch::status(JobStatus::Failed).with_log(reason.clone()))
                .await?;
            return Ok(());
        }

        let size = format.size_estimate.as_deref().unwrap_or("~unknown size");
        for pct in PROGRESS_STEPS {
            self.step().await;
            self.store
                .update(
                    job_id,
                    &JobPatch::default()
                        .with_progress(pct)
                        .with_log(format!("[download] {pct:>5.1}% of {size}")),
                )
                .await?;
        }

        let full_path = output_location(&row, &filename);
        self.store
            .update(
                job_id,
                &JobPatch::status(JobStatus::Completed)
                    .with_output(filename, full_path.clone())
                    .with_log(format!("Successfully downloaded to: {full_path}")),
            )
            .await?;
        Ok(())
    }

    /// Poll the row until a format is selected. `None` if the job went terminal first.
    async fn wait_for_selection(&self, job_id: JobId) -> Result<Option<String>> {
        loop {
            self.step().await;
            let row = self.store.read_one(job_id).await?;
            if let Some(id) = row.selected_format {
                return Ok(Some(id));
            }
            if row.status.is_terminal() {
                return Ok(None);
            }
        }
    }

    async fn step(&self) {
        tokio::time::sleep(self.step_delay).await;
    }
}

/// `<output_path>/<platform>/<filename>`, mirroring per-uploader folders.
fn output_location(row: &JobRow, filename: &str) -> String {
    Path::new(&row.output_path)
        .join(&row.platform)
        .join(filename)
        .to_string_lossy()
        .into_owned()
}
