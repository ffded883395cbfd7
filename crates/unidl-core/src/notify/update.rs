//! Normalized update event shared by both notification sources.

use std::fmt;

use crate::store::{Format, JobId, JobRow, JobStatus};

/// Where an update came from. Only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateSource {
    Push,
    Poll,
    /// Emitted by the orchestrator itself (initial scan notice).
    Synthetic,
}

impl fmt::Display for UpdateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UpdateSource::Push => "push",
            UpdateSource::Poll => "poll",
            UpdateSource::Synthetic => "synthetic",
        })
    }
}

/// A view of one job-store change. Every field is independently optional.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub job_id: JobId,
    pub source: UpdateSource,
    pub status: Option<JobStatus>,
    pub formats: Option<Vec<Format>>,
    pub selected_format_id: Option<String>,
    pub log_line: Option<String>,
    pub progress_percent: Option<f64>,
    pub filename: Option<String>,
    pub full_path: Option<String>,
}

impl Update {
    /// Empty update for `job_id`.
    pub fn new(job_id: JobId, source: UpdateSource) -> Self {
        Self {
            job_id,
            source,
            status: None,
            formats: None,
            selected_format_id: None,
            log_line: None,
            progress_percent: None,
            filename: None,
            full_path: None,
        }
    }

    /// Full-row view, as delivered by either source.
    pub fn from_row(row: &JobRow, source: UpdateSource) -> Self {
        Self {
            job_id: row.id,
            source,
            status: Some(row.status),
            formats: row.available_formats.clone(),
            selected_format_id: row.selected_format.clone(),
            log_line: row.last_log.clone(),
            progress_percent: row.progress,
            filename: row.filename.clone(),
            full_path: row.full_path.clone(),
        }
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_log(mut self, line: impl Into<String>) -> Self {
        self.log_line = Some(line.into());
        self
    }
}
