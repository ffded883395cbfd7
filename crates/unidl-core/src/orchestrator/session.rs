//! State for the one job in flight: id, gate, teardown handles, last values seen.

use std::path::{Path, PathBuf};

use tokio::sync::mpsc;

use super::error::OrchestratorError;
use super::events::{OrchestratorEvent, Outcome};
use super::gate::{GateTransition, SelectionGate};
use crate::notify::{NotificationMerger, Update};
use crate::store::{JobId, JobInput, JobStatus};

/// Reason used when the engine failed without saying why.
const GENERIC_FAILURE: &str = "Download failed";

/// What the orchestrator should do after applying an update.
pub(super) enum Step {
    Continue,
    Finished(Result<Outcome, OrchestratorError>),
}

pub(super) struct JobSession {
    pub(super) job_id: JobId,
    pub(super) gate: SelectionGate,
    output_path: String,
    merger: NotificationMerger,
    last_status: Option<JobStatus>,
    last_log: Option<String>,
    /// Whether the latest update brought a log line not seen before.
    log_is_new: bool,
    filename: Option<String>,
    full_path: Option<String>,
    terminated: bool,
}

impl JobSession {
    pub(super) fn new(job_id: JobId, input: &JobInput, merger: NotificationMerger) -> Self {
        Self {
            job_id,
            gate: SelectionGate::new(),
            output_path: input.desired_output_path.clone(),
            merger,
            last_status: None,
            last_log: None,
            log_is_new: false,
            filename: None,
            full_path: None,
            terminated: false,
        }
    }

    /// Apply one merged update. Forwards it unconditionally, then runs the
    /// gate and terminal checks. No-op once terminated.
    pub(super) fn apply(
        &mut self,
        update: Update,
        events: &mpsc::UnboundedSender<OrchestratorEvent>,
    ) -> Step {
        if self.terminated {
            return Step::Continue;
        }

        self.remember(&update);
        let status = update.status;
        let formats = update.formats.clone();
        let _ = events.send(OrchestratorEvent::Update(update));

        match status {
            Some(JobStatus::WaitingForSelection) => {
                match self.gate.observe(formats.as_deref()) {
                    GateTransition::Opened => {
                        tracing::info!(job_id = self.job_id, "format selection requested");
                        let _ = events.send(OrchestratorEvent::ShowPicker {
                            job_id: self.job_id,
                            formats: formats.unwrap_or_default(),
                        });
                    }
                    GateTransition::AlreadyOpen => {
                        tracing::trace!(job_id = self.job_id, "picker already shown");
                    }
                    GateTransition::Suppressed => {
                        tracing::debug!(
                            job_id = self.job_id,
                            selected = ?self.gate.selected(),
                            "ignoring selection request"
                        );
                    }
                }
                Step::Continue
            }
            Some(JobStatus::Completed) => Step::Finished(Ok(self.outcome())),
            Some(JobStatus::Failed) => Step::Finished(Err(OrchestratorError::JobFailed {
                job_id: self.job_id,
                reason: self.failure_reason(),
            })),
            _ => Step::Continue,
        }
    }

    fn remember(&mut self, update: &Update) {
        if let Some(status) = update.status {
            if self.last_status != Some(status) {
                tracing::debug!(
                    job_id = self.job_id,
                    source = %update.source,
                    status = status.as_str(),
                    "status changed"
                );
                self.last_status = Some(status);
            }
        }
        self.log_is_new = update.log_line.is_some() && update.log_line != self.last_log;
        if self.log_is_new {
            self.last_log = update.log_line.clone();
        }
        if update.filename.is_some() {
            self.filename = update.filename.clone();
        }
        if update.full_path.is_some() {
            self.full_path = update.full_path.clone();
        }
    }

    fn outcome(&self) -> Outcome {
        let full_path = match (&self.full_path, &self.filename) {
            (Some(p), _) => Some(PathBuf::from(p)),
            (None, Some(name)) => Some(Path::new(&self.output_path).join(name)),
            (None, None) => None,
        };
        Outcome {
            job_id: self.job_id,
            filename: self.filename.clone(),
            full_path,
        }
    }

    /// Failure text for a `failed` update.
    ///
    /// A log line written with the failure wins. Otherwise the row's filename
    /// field is used (older engines write the error text there) ahead of a
    /// log line left over from an earlier step. Falls back to a generic message.
    fn failure_reason(&self) -> String {
        let candidates = if self.log_is_new {
            [self.last_log.as_deref(), self.filename.as_deref()]
        } else {
            [self.filename.as_deref(), self.last_log.as_deref()]
        };
        candidates
            .into_iter()
            .flatten()
            .find(|s| !s.trim().is_empty())
            .unwrap_or(GENERIC_FAILURE)
            .to_string()
    }

    /// Tear down both notification sources. Returns true the first time.
    pub(super) fn terminate(&mut self) -> bool {
        if self.terminated {
            return false;
        }
        self.terminated = true;
        self.merger.close()
    }
}
