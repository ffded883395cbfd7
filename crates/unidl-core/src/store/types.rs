//! Types used by the job store: rows, inputs, partial updates.

use serde::{Deserialize, Serialize};

use crate::platform::Platform;

/// Job identifier assigned by the store on insert.
pub type JobId = i64;

/// Lifecycle status of a job row, stored as a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    Scanning,
    WaitingForSelection,
    Processing,
    Downloading,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Scanning => "scanning",
            JobStatus::WaitingForSelection => "waiting_for_selection",
            JobStatus::Processing => "processing",
            JobStatus::Downloading => "downloading",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Unknown strings map to `Failed` so a corrupted row ends the job.
    pub fn from_str(s: &str) -> Self {
        match s {
            "scanning" => JobStatus::Scanning,
            "waiting_for_selection" => JobStatus::WaitingForSelection,
            "processing" => JobStatus::Processing,
            "downloading" => JobStatus::Downloading,
            "completed" => JobStatus::Completed,
            "failed" => JobStatus::Failed,
            _ => JobStatus::Failed,
        }
    }

    /// `completed` and `failed` end a job.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// One downloadable rendition discovered by the engine.
///
/// Serialized with the engine's column names (`format_id`, `ext`, `filesize`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Format {
    pub format_id: String,
    pub resolution: String,
    #[serde(rename = "ext")]
    pub container: String,
    #[serde(rename = "filesize", default, skip_serializing_if = "Option::is_none")]
    pub size_estimate: Option<String>,
}

impl Format {
    pub fn new(format_id: &str, resolution: &str, container: &str) -> Self {
        Self {
            format_id: format_id.to_string(),
            resolution: resolution.to_string(),
            container: container.to_string(),
            size_estimate: None,
        }
    }

    pub fn with_size(mut self, size: &str) -> Self {
        self.size_estimate = Some(size.to_string());
        self
    }

    /// True for 1080p and 4K renditions.
    pub fn is_high_quality(&self) -> bool {
        self.resolution.contains("1080") || self.resolution.contains("4K")
    }
}

/// Immutable inputs captured when the user submits a URL.
#[derive(Debug, Clone)]
pub struct JobInput {
    pub url: String,
    pub platform: Platform,
    pub desired_output_path: String,
    pub is_playlist_request: bool,
    pub requesting_user_id: Option<String>,
}

impl JobInput {
    /// Input with the platform and playlist flag detected from `url`.
    pub fn detect(url: &str, desired_output_path: &str) -> Self {
        Self {
            url: url.to_string(),
            platform: crate::platform::detect_platform(url),
            desired_output_path: desired_output_path.to_string(),
            is_playlist_request: crate::platform::is_playlist(url),
            requesting_user_id: None,
        }
    }
}

/// Full job row as read back from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRow {
    pub id: JobId,
    pub url: String,
    pub platform: String,
    pub output_path: String,
    pub is_playlist: bool,
    pub user_id: Option<String>,
    pub status: JobStatus,
    pub available_formats: Option<Vec<Format>>,
    pub selected_format: Option<String>,
    pub last_log: Option<String>,
    pub progress: Option<f64>,
    pub filename: Option<String>,
    pub full_path: Option<String>,
}

impl JobRow {
    /// Fresh row for `input` in `scanning` state; used by in-memory stores.
    pub fn scanning(id: JobId, input: &JobInput) -> Self {
        Self {
            id,
            url: input.url.clone(),
            platform: input.platform.as_str().to_string(),
            output_path: input.desired_output_path.clone(),
            is_playlist: input.is_playlist_request,
            user_id: input.requesting_user_id.clone(),
            status: JobStatus::Scanning,
            available_formats: None,
            selected_format: None,
            last_log: None,
            progress: None,
            filename: None,
            full_path: None,
        }
    }

    /// Applies the set fields of `patch` to this row.
    pub fn apply(&mut self, patch: &JobPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(ref formats) = patch.available_formats {
            self.available_formats = Some(formats.clone());
        }
        if let Some(ref id) = patch.selected_format {
            self.selected_format = Some(id.clone());
        }
        if let Some(ref log) = patch.last_log {
            self.last_log = Some(log.clone());
        }
        if let Some(p) = patch.progress {
            self.progress = Some(p);
        }
        if let Some(ref name) = patch.filename {
            self.filename = Some(name.clone());
        }
        if let Some(ref path) = patch.full_path {
            self.full_path = Some(path.clone());
        }
    }
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub available_formats: Option<Vec<Format>>,
    pub selected_format: Option<String>,
    pub last_log: Option<String>,
    pub progress: Option<f64>,
    pub filename: Option<String>,
    pub full_path: Option<String>,
}

impl JobPatch {
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn with_log(mut self, line: impl Into<String>) -> Self {
        self.last_log = Some(line.into());
        self
    }

    pub fn with_progress(mut self, pct: f64) -> Self {
        self.progress = Some(pct);
        self
    }

    pub fn with_formats(mut self, formats: Vec<Format>) -> Self {
        self.available_formats = Some(formats);
        self
    }

    pub fn with_output(mut self, filename: impl Into<String>, full_path: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self.full_path = Some(full_path.into());
        self
    }
}

/// Summary view used by the CLI `status` command.
#[derive(Debug, Clone)]
pub struct JobSummary {
    pub id: JobId,
    pub url: String,
    pub status: JobStatus,
    pub filename: Option<String>,
    pub created_at: i64,
}
