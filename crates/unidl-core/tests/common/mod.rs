#![allow(dead_code)]

pub mod scripted_store;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use unidl_core::orchestrator::{Orchestrator, OrchestratorError, OrchestratorEvent, Outcome};
use unidl_core::store::{Format, JobId, JobInput, JobStatus};

use scripted_store::ScriptedStore;

/// Poll interval long enough that only push delivers during a test.
pub const NO_POLL: Duration = Duration::from_secs(3600);
pub const FAST_POLL: Duration = Duration::from_millis(10);
const WAIT: Duration = Duration::from_secs(5);

pub fn formats_ab() -> Vec<Format> {
    vec![
        Format::new("A", "720p", "mp4"),
        Format::new("B", "1080p", "mp4"),
    ]
}

/// A running `start` call plus the presentation side of the channel.
pub struct Harness {
    pub store: Arc<ScriptedStore>,
    pub orch: Orchestrator,
    pub events: mpsc::UnboundedReceiver<OrchestratorEvent>,
    pub job: JoinHandle<Result<Outcome, OrchestratorError>>,
    pub job_id: JobId,
    pub seen: Vec<OrchestratorEvent>,
}

impl Harness {
    /// Start a job and wait for the initial synthetic scanning update.
    pub async fn start(store: Arc<ScriptedStore>, poll: Duration) -> Self {
        let (orch, events) = Orchestrator::new(store.clone(), poll);
        Self::start_with(store, orch, events, "https://www.youtube.com/watch?v=abc").await
    }

    pub async fn start_with(
        store: Arc<ScriptedStore>,
        orch: Orchestrator,
        events: mpsc::UnboundedReceiver<OrchestratorEvent>,
        url: &str,
    ) -> Self {
        let runner = orch.clone();
        let input = JobInput::detect(url, "Downloads");
        let job = tokio::spawn(async move { runner.start(input).await });
        let mut h = Self {
            store,
            orch,
            events,
            job,
            job_id: 0,
            seen: Vec::new(),
        };
        match h.next_event().await {
            OrchestratorEvent::Update(u) => {
                assert_eq!(u.status, Some(JobStatus::Scanning));
                h.job_id = u.job_id;
            }
            other => panic!("expected initial scanning update, got {other:?}"),
        }
        h
    }

    pub async fn next_event(&mut self) -> OrchestratorEvent {
        let ev = tokio::time::timeout(WAIT, self.events.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed");
        self.seen.push(ev.clone());
        ev
    }

    /// Read events until one matches `pred`; returns it.
    pub async fn wait_for(&mut self, pred: impl Fn(&OrchestratorEvent) -> bool) -> OrchestratorEvent {
        loop {
            let ev = self.next_event().await;
            if pred(&ev) {
                return ev;
            }
        }
    }

    /// Wait for the forwarded update carrying `status`.
    pub async fn wait_for_status(&mut self, status: JobStatus) {
        self.wait_for(|ev| matches!(ev, OrchestratorEvent::Update(u) if u.status == Some(status)))
            .await;
    }

    pub async fn outcome(&mut self) -> Result<Outcome, OrchestratorError> {
        let job = &mut self.job;
        tokio::time::timeout(WAIT, job)
            .await
            .expect("start did not resolve")
            .expect("start task panicked")
    }

    /// Collect whatever is already queued, then wait `quiet` and check nothing else arrives.
    pub async fn drain_then_quiet(&mut self, quiet: Duration) -> usize {
        while let Ok(ev) = self.events.try_recv() {
            self.seen.push(ev);
        }
        tokio::time::sleep(quiet).await;
        let mut late = 0;
        while let Ok(ev) = self.events.try_recv() {
            self.seen.push(ev);
            late += 1;
        }
        late
    }

    pub fn count(&self, pred: impl Fn(&OrchestratorEvent) -> bool) -> usize {
        self.seen.iter().filter(|ev| pred(ev)).count()
    }

    pub fn pickers(&self) -> usize {
        self.count(|ev| matches!(ev, OrchestratorEvent::ShowPicker { .. }))
    }

    pub fn terminals(&self) -> usize {
        self.count(OrchestratorEvent::is_terminal)
    }
}
