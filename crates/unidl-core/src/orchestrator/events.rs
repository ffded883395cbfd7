//! Events delivered to the presentation layer.

use std::path::PathBuf;

use crate::notify::Update;
use crate::store::{Format, JobId};

/// Successful end of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub job_id: JobId,
    pub filename: Option<String>,
    pub full_path: Option<PathBuf>,
}

/// One message on the presentation channel.
///
/// `Update` may repeat with identical content; `ShowPicker` is sent once per
/// job; exactly one of `Finished`/`Failed` ends each job.
#[derive(Debug, Clone, PartialEq)]
pub enum OrchestratorEvent {
    Update(Update),
    ShowPicker { job_id: JobId, formats: Vec<Format> },
    Finished { job_id: JobId, outcome: Outcome },
    Failed { job_id: JobId, reason: String },
}

impl OrchestratorEvent {
    pub fn job_id(&self) -> JobId {
        match self {
            OrchestratorEvent::Update(u) => u.job_id,
            OrchestratorEvent::ShowPicker { job_id, .. }
            | OrchestratorEvent::Finished { job_id, .. }
            | OrchestratorEvent::Failed { job_id, .. } => *job_id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrchestratorEvent::Finished { .. } | OrchestratorEvent::Failed { .. }
        )
    }
}
