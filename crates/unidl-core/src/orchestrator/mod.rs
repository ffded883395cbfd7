//! Job orchestrator: runs one download job from submission to a terminal status.
//!
//! `start` inserts the job, opens a [`NotificationMerger`] and consumes merged
//! updates until `completed` or `failed`. `submit_selection` answers the
//! format prompt. Both take the session lock for their whole duration, so an
//! update and a selection never interleave.

mod error;
mod events;
mod gate;
mod session;

pub use error::OrchestratorError;
pub use events::{OrchestratorEvent, Outcome};
pub use gate::{GateError, GateTransition, SelectionGate};

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};

use crate::config::UnidlConfig;
use crate::notify::{NotificationMerger, Update, UpdateSource};
use crate::store::{JobId, JobInput, JobPatch, JobStatus, JobStore};
use session::{JobSession, Step};

/// Log line emitted right after the job row is created.
pub const SCAN_NOTICE: &str = "Scanning video formats...";

/// Failure reason sent when a `start` future is dropped mid-job.
pub const CANCELLED: &str = "Job cancelled";

struct Inner {
    store: Arc<dyn JobStore>,
    poll_interval: Duration,
    events: mpsc::UnboundedSender<OrchestratorEvent>,
    active: Mutex<Option<JobSession>>,
}

/// Handle to the orchestrator. Clones share the same active-job slot, so one
/// task can await `start` while another calls `submit_selection`.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    /// New orchestrator and the receiving end of its presentation channel.
    pub fn new(
        store: Arc<dyn JobStore>,
        poll_interval: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<OrchestratorEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let inner = Inner {
            store,
            poll_interval,
            events,
            active: Mutex::new(None),
        };
        (
            Self {
                inner: Arc::new(inner),
            },
            rx,
        )
    }

    /// Like [`new`](Self::new) with the poll interval taken from config.
    pub fn with_config(
        store: Arc<dyn JobStore>,
        cfg: &UnidlConfig,
    ) -> (Self, mpsc::UnboundedReceiver<OrchestratorEvent>) {
        Self::new(store, cfg.poll_interval())
    }

    /// Id of the job currently in flight.
    pub async fn active_job(&self) -> Option<JobId> {
        self.inner.active.lock().await.as_ref().map(|s| s.job_id)
    }

    /// Run one job to completion.
    ///
    /// Fails fast with `InvalidInput` (nothing written), `JobInFlight` (another
    /// job is active; nothing written) or `InitializationFailed` (insert failed,
    /// no merger started). Otherwise suspends until the engine reports
    /// `completed` or `failed`.
    ///
    /// Dropping the returned future mid-job closes the merger, frees the
    /// active slot and emits `Failed` with [`CANCELLED`]. The row itself is
    /// left as the engine last wrote it.
    pub async fn start(&self, input: JobInput) -> Result<Outcome, OrchestratorError> {
        validate_input(&input)?;

        let (job_id, mut updates) = {
            let mut slot = self.inner.active.lock().await;
            if let Some(active) = slot.as_ref() {
                return Err(OrchestratorError::JobInFlight(active.job_id));
            }

            let job_id = match self.inner.store.insert(&input).await {
                Ok(Some(id)) => id,
                Ok(None) => {
                    tracing::warn!(url = %input.url, "job insert returned no id");
                    return Err(OrchestratorError::InitializationFailed(
                        "store returned no job id".to_string(),
                    ));
                }
                Err(e) => {
                    tracing::warn!(url = %input.url, "job insert failed: {:#}", e);
                    return Err(OrchestratorError::InitializationFailed(format!("{:#}", e)));
                }
            };

            let (merger, rx) = NotificationMerger::open(
                Arc::clone(&self.inner.store),
                job_id,
                self.inner.poll_interval,
            );
            *slot = Some(JobSession::new(job_id, &input, merger));
            tracing::info!(job_id, url = %input.url, platform = %input.platform, "job started");

            self.emit(OrchestratorEvent::Update(
                Update::new(job_id, UpdateSource::Synthetic)
                    .with_status(JobStatus::Scanning)
                    .with_log(SCAN_NOTICE),
            ));
            (job_id, rx)
        };
        let mut guard = StartGuard {
            inner: Arc::clone(&self.inner),
            job_id,
            armed: true,
        };

        while let Some(update) = updates.recv().await {
            if let Some(result) = self.dispatch(update).await {
                guard.armed = false;
                return result;
            }
        }

        // Only reachable if both sources died without a terminal status.
        let closed = OrchestratorError::JobFailed {
            job_id,
            reason: "notification stream closed".to_string(),
        };
        let mut slot = self.inner.active.lock().await;
        guard.armed = false;
        self.finish_locked(&mut slot, job_id, Err(closed.clone()))
            .unwrap_or(Err(closed))
    }

    /// Answer the format prompt for the active job.
    ///
    /// Only valid while the gate is open. On success the selection and
    /// `processing` status are written and the gate closes for good. A failed
    /// write is reported as a log line and `SelectionNotSaved`; the gate stays
    /// open so the user can retry.
    pub async fn submit_selection(&self, format_id: &str) -> Result<(), OrchestratorError> {
        let mut slot = self.inner.active.lock().await;
        let Some(session) = slot.as_mut() else {
            return Err(OrchestratorError::NoActiveSelection);
        };
        match session.gate.check(format_id) {
            Ok(()) => {}
            Err(GateError::NotOpen) => return Err(OrchestratorError::NoActiveSelection),
            Err(GateError::UnknownFormat) => {
                return Err(OrchestratorError::UnknownFormat(format_id.to_string()))
            }
        }

        let job_id = session.job_id;
        let patch = JobPatch {
            selected_format: Some(format_id.to_string()),
            ..JobPatch::status(JobStatus::Processing)
        };
        if let Err(e) = self.inner.store.update(job_id, &patch).await {
            let msg = format!("{:#}", e);
            tracing::warn!(job_id, format_id, "selection write failed: {}", msg);
            self.emit(OrchestratorEvent::Update(
                Update::new(job_id, UpdateSource::Synthetic)
                    .with_log(format!("Could not save format selection: {msg}")),
            ));
            return Err(OrchestratorError::SelectionNotSaved(msg));
        }

        session
            .gate
            .select(format_id)
            .map_err(|_| OrchestratorError::NoActiveSelection)?;
        tracing::info!(job_id, format_id, "format selected");
        self.emit(OrchestratorEvent::Update(
            Update::new(job_id, UpdateSource::Synthetic)
                .with_log(format!("Selected format: {format_id}. Starting download...")),
        ));
        Ok(())
    }

    /// Apply one merged update. Returns the job result once terminal.
    async fn dispatch(&self, update: Update) -> Option<Result<Outcome, OrchestratorError>> {
        let job_id = update.job_id;
        let mut slot = self.inner.active.lock().await;
        let session = match slot.as_mut() {
            Some(s) if s.job_id == job_id => s,
            _ => {
                tracing::debug!(job_id, source = %update.source, "dropping update for inactive job");
                return None;
            }
        };
        match session.apply(update, &self.inner.events) {
            Step::Continue => None,
            Step::Finished(result) => self.finish_locked(&mut slot, job_id, result),
        }
    }

    /// Tear down the session for `job_id` and emit the terminal event, all
    /// under the session lock. `None` if that session is already gone.
    fn finish_locked(
        &self,
        slot: &mut Option<JobSession>,
        job_id: JobId,
        result: Result<Outcome, OrchestratorError>,
    ) -> Option<Result<Outcome, OrchestratorError>> {
        let mut session = match slot.take() {
            Some(s) if s.job_id == job_id => s,
            other => {
                *slot = other;
                return None;
            }
        };
        session.terminate();

        match &result {
            Ok(outcome) => {
                tracing::info!(job_id, filename = ?outcome.filename, "job completed");
                self.emit(OrchestratorEvent::Finished {
                    job_id,
                    outcome: outcome.clone(),
                });
            }
            Err(e) => {
                let reason = e.failure_reason().unwrap_or("Download failed").to_string();
                tracing::warn!(job_id, %reason, "job failed");
                self.emit(OrchestratorEvent::Failed { job_id, reason });
            }
        }
        Some(result)
    }

    fn emit(&self, event: OrchestratorEvent) {
        // Receiver gone just means nobody is rendering.
        let _ = self.inner.events.send(event);
    }
}

/// Releases the active slot if a `start` future is dropped before its job
/// reached a terminal status.
struct StartGuard {
    inner: Arc<Inner>,
    job_id: JobId,
    armed: bool,
}

impl Drop for StartGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Ok(mut slot) = self.inner.active.try_lock() {
            abandon(&self.inner, &mut slot, self.job_id);
            return;
        }
        // Lock is held elsewhere; finish the release on the runtime.
        let inner = Arc::clone(&self.inner);
        let job_id = self.job_id;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let mut slot = inner.active.lock().await;
                    abandon(&inner, &mut slot, job_id);
                });
            }
            Err(_) => tracing::warn!(job_id, "start dropped outside a runtime; slot not released"),
        }
    }
}

/// Close the session for `job_id`, if it is still the active one.
fn abandon(inner: &Inner, slot: &mut Option<JobSession>, job_id: JobId) {
    let mut session = match slot.take() {
        Some(s) if s.job_id == job_id => s,
        other => {
            *slot = other;
            return;
        }
    };
    session.terminate();
    tracing::warn!(job_id, "job abandoned before a terminal status");
    let _ = inner.events.send(OrchestratorEvent::Failed {
        job_id,
        reason: CANCELLED.to_string(),
    });
}

/// URL must be non-empty and parse with a host.
fn validate_input(input: &JobInput) -> Result<(), OrchestratorError> {
    let url = input.url.trim();
    if url.is_empty() {
        return Err(OrchestratorError::InvalidInput("URL is empty".to_string()));
    }
    match url::Url::parse(url) {
        Ok(u) if u.has_host() => Ok(()),
        _ => Err(OrchestratorError::InvalidInput(format!(
            "Please enter a valid URL: {url}"
        ))),
    }
}
