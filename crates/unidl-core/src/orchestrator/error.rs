//! Error taxonomy for the job orchestrator.

use crate::store::JobId;

/// Errors surfaced by [`Orchestrator`](super::Orchestrator) entry points.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OrchestratorError {
    /// URL empty or unparseable; nothing was written to the store.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The store insert failed or returned no id; no job was started.
    #[error("could not create job: {0}")]
    InitializationFailed(String),

    /// The engine reported a terminal failure.
    #[error("download failed: {reason}")]
    JobFailed { job_id: JobId, reason: String },

    /// Selection submitted with no open gate.
    #[error("no format selection is pending")]
    NoActiveSelection,

    /// `start` called while another job is in flight.
    #[error("job {0} is still in progress")]
    JobInFlight(JobId),

    /// Selected format id was not among the offered formats.
    #[error("format {0} was not offered for this job")]
    UnknownFormat(String),

    /// The selection write failed; the gate is still open, so it can be retried.
    #[error("could not save format selection: {0}")]
    SelectionNotSaved(String),
}

impl OrchestratorError {
    /// Failure reason for `JobFailed`, if this is one.
    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            OrchestratorError::JobFailed { reason, .. } => Some(reason),
            _ => None,
        }
    }
}
