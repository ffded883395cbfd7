//! Orchestrator lifecycle against a scripted store.

mod common;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use common::scripted_store::{InsertMode, ScriptedStore};
use common::{formats_ab, Harness, FAST_POLL, NO_POLL};
use unidl_core::orchestrator::{Orchestrator, OrchestratorError, OrchestratorEvent, CANCELLED};
use unidl_core::store::{JobInput, JobPatch, JobStatus};

fn waiting() -> JobPatch {
    JobPatch::status(JobStatus::WaitingForSelection).with_formats(formats_ab())
}

fn store() -> Arc<ScriptedStore> {
    Arc::new(ScriptedStore::new())
}

#[tokio::test]
async fn picker_shows_once_and_job_completes() {
    let mut h = Harness::start(store(), NO_POLL).await;
    let id = h.job_id;

    h.store.emit(id, JobPatch::status(JobStatus::Scanning));
    h.wait_for_status(JobStatus::Scanning).await;

    h.store.emit(id, waiting());
    let picker = h
        .wait_for(|ev| matches!(ev, OrchestratorEvent::ShowPicker { .. }))
        .await;
    match picker {
        OrchestratorEvent::ShowPicker { job_id, formats } => {
            assert_eq!(job_id, id);
            assert_eq!(formats, formats_ab());
        }
        _ => unreachable!(),
    }

    // Repeat delivery of the same status must not re-open the picker.
    h.store.emit(id, waiting());
    h.wait_for_status(JobStatus::WaitingForSelection).await;

    h.orch.submit_selection("B").await.unwrap();
    h.wait_for(|ev| {
        matches!(ev, OrchestratorEvent::Update(u)
            if u.log_line.as_deref() == Some("Selected format: B. Starting download..."))
    })
    .await;

    // Stale row arriving after the selection.
    h.store.emit(id, waiting());
    h.store.emit(id, JobPatch::status(JobStatus::Processing));
    h.store.emit(
        id,
        JobPatch {
            filename: Some("x.mp4".to_string()),
            ..JobPatch::status(JobStatus::Completed)
        },
    );

    let outcome = h.outcome().await.unwrap();
    assert_eq!(outcome.job_id, id);
    assert_eq!(outcome.filename.as_deref(), Some("x.mp4"));
    assert_eq!(outcome.full_path, Some(PathBuf::from("Downloads").join("x.mp4")));

    assert_eq!(h.drain_then_quiet(Duration::from_millis(30)).await, 0);
    assert_eq!(h.pickers(), 1);
    assert_eq!(h.terminals(), 1);
    assert!(h.seen.last().unwrap().is_terminal());

    let writes = h.store.writes.lock().unwrap().clone();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].1.selected_format.as_deref(), Some("B"));
    assert_eq!(writes[0].1.status, Some(JobStatus::Processing));
    assert_eq!(h.store.row(id).unwrap().selected_format.as_deref(), Some("B"));

    assert_eq!(ScriptedStore::count(&h.store.unsubscribes), 1);
    assert!(h.store.feed.is_empty());
    assert_eq!(h.orch.active_job().await, None);
}

#[tokio::test]
async fn failure_uses_last_log_and_stops_updates() {
    let mut h = Harness::start(store(), NO_POLL).await;
    let id = h.job_id;

    h.store.emit(
        id,
        JobPatch::status(JobStatus::Failed).with_log("network error"),
    );
    let err = h.outcome().await.unwrap_err();
    assert_eq!(
        err,
        OrchestratorError::JobFailed {
            job_id: id,
            reason: "network error".to_string()
        }
    );

    // Engine keeps writing after teardown; nobody is listening any more.
    assert_eq!(h.store.emit(id, JobPatch::status(JobStatus::Downloading)), 0);
    assert_eq!(h.drain_then_quiet(Duration::from_millis(30)).await, 0);
    assert_eq!(
        h.count(|ev| matches!(ev, OrchestratorEvent::Failed { reason, .. } if reason == "network error")),
        1
    );
    assert!(h.seen.last().unwrap().is_terminal());
}

#[tokio::test]
async fn failure_reason_falls_back_to_filename_then_default() {
    let mut h = Harness::start(store(), NO_POLL).await;
    h.store.emit(
        h.job_id,
        JobPatch {
            filename: Some("Error: unsupported URL".to_string()),
            ..JobPatch::status(JobStatus::Failed)
        },
    );
    assert_eq!(
        h.outcome().await.unwrap_err().failure_reason(),
        Some("Error: unsupported URL")
    );

    let mut h = Harness::start(store(), NO_POLL).await;
    h.store.emit(h.job_id, JobPatch::status(JobStatus::Failed));
    assert_eq!(
        h.outcome().await.unwrap_err().failure_reason(),
        Some("Download failed")
    );
}

#[tokio::test]
async fn filename_error_beats_log_from_an_earlier_step() {
    let mut h = Harness::start(store(), NO_POLL).await;
    let id = h.job_id;
    h.store.emit(id, waiting().with_log("Found 2 formats"));
    h.wait_for(|ev| matches!(ev, OrchestratorEvent::ShowPicker { .. }))
        .await;

    // The failed row still carries the old log line; the error is in filename.
    h.store.emit(
        id,
        JobPatch {
            filename: Some("Error: HTTP 403".to_string()),
            ..JobPatch::status(JobStatus::Failed)
        },
    );
    assert_eq!(
        h.outcome().await.unwrap_err().failure_reason(),
        Some("Error: HTTP 403")
    );
}

#[tokio::test]
async fn log_written_with_failure_beats_filename() {
    let mut h = Harness::start(store(), NO_POLL).await;
    let id = h.job_id;
    h.store.emit(
        id,
        JobPatch {
            filename: Some("clip.mp4".to_string()),
            ..JobPatch::status(JobStatus::Downloading).with_log("[download] 50.0%")
        },
    );
    h.wait_for_status(JobStatus::Downloading).await;

    h.store.emit(
        id,
        JobPatch::status(JobStatus::Failed).with_log("ERROR: connection reset"),
    );
    assert_eq!(
        h.outcome().await.unwrap_err().failure_reason(),
        Some("ERROR: connection reset")
    );
}

#[tokio::test]
async fn terminal_status_seen_by_both_sources_finishes_once() {
    let mut h = Harness::start(store(), FAST_POLL).await;
    let id = h.job_id;

    let done = JobPatch {
        filename: Some("x.mp4".to_string()),
        ..JobPatch::status(JobStatus::Completed)
    };
    h.store.emit(id, done.clone());
    h.store.emit(id, done);

    assert!(h.outcome().await.is_ok());
    assert_eq!(h.drain_then_quiet(Duration::from_millis(50)).await, 0);
    assert_eq!(h.terminals(), 1);
    assert_eq!(ScriptedStore::count(&h.store.unsubscribes), 1);
}

#[tokio::test]
async fn poll_errors_do_not_abort_job() {
    let store = store();
    store.fail_next_reads(5);
    let mut h = Harness::start(store, FAST_POLL).await;

    while ScriptedStore::count(&h.store.failed_reads) < 5 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(h.orch.active_job().await, Some(h.job_id));

    h.store.emit(h.job_id, JobPatch::status(JobStatus::Completed));
    assert!(h.outcome().await.is_ok());
}

#[tokio::test]
async fn poll_alone_drives_job_when_subscribe_fails() {
    let store = store();
    store.fail_subscribe(true);
    let mut h = Harness::start(store, FAST_POLL).await;
    let id = h.job_id;

    h.store.set_quiet(id, waiting());
    h.wait_for(|ev| matches!(ev, OrchestratorEvent::ShowPicker { .. }))
        .await;
    h.orch.submit_selection("A").await.unwrap();
    h.store.set_quiet(
        id,
        JobPatch::status(JobStatus::Completed).with_output("a.mp4", "/tmp/a.mp4"),
    );

    let outcome = h.outcome().await.unwrap();
    assert_eq!(outcome.full_path, Some(PathBuf::from("/tmp/a.mp4")));
    h.drain_then_quiet(Duration::from_millis(20)).await;
    assert_eq!(h.pickers(), 1);
    assert_eq!(ScriptedStore::count(&h.store.subscribes), 0);
}

#[tokio::test]
async fn invalid_url_writes_nothing() {
    let store = store();
    let (orch, mut events) = Orchestrator::new(store.clone(), NO_POLL);

    for url in ["", "   ", "not a url", "youtube.com/watch?v=a"] {
        let err = orch.start(JobInput::detect(url, "Downloads")).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidInput(_)), "{url:?}");
    }
    assert_eq!(ScriptedStore::count(&store.inserts), 0);
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn insert_failure_is_initialization_error() {
    for mode in [InsertMode::Fail, InsertMode::NoId] {
        let store = store();
        store.set_insert_mode(mode);
        let (orch, mut events) = Orchestrator::new(store.clone(), NO_POLL);

        let err = orch
            .start(JobInput::detect("https://vimeo.com/1", "Downloads"))
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::InitializationFailed(_)));
        assert_eq!(ScriptedStore::count(&store.subscribes), 0);
        assert_eq!(orch.active_job().await, None);
        assert!(events.try_recv().is_err());
    }
}

#[tokio::test]
async fn second_start_while_in_flight_is_rejected() {
    let mut h = Harness::start(store(), NO_POLL).await;

    let err = h
        .orch
        .start(JobInput::detect("https://vimeo.com/2", "Downloads"))
        .await
        .unwrap_err();
    assert_eq!(err, OrchestratorError::JobInFlight(h.job_id));
    assert_eq!(ScriptedStore::count(&h.store.inserts), 1);

    h.store.emit(h.job_id, JobPatch::status(JobStatus::Completed));
    assert!(h.outcome().await.is_ok());
}

#[tokio::test]
async fn orchestrator_accepts_new_job_after_terminal() {
    let store = store();
    let (orch, events) = Orchestrator::new(store.clone(), NO_POLL);
    let mut first = Harness::start_with(store.clone(), orch.clone(), events, "https://vimeo.com/3").await;
    first.store.emit(first.job_id, JobPatch::status(JobStatus::Completed));
    assert!(first.outcome().await.is_ok());
    first.drain_then_quiet(Duration::ZERO).await;

    let Harness { events, .. } = first;
    let second = Harness::start_with(store, orch, events, "https://vimeo.com/4").await;
    assert_eq!(second.job_id, 2);
}

#[tokio::test]
async fn selection_rejected_when_gate_not_open() {
    let store = store();
    let (orch, _events) = Orchestrator::new(store.clone(), NO_POLL);
    assert_eq!(
        orch.submit_selection("A").await,
        Err(OrchestratorError::NoActiveSelection)
    );

    let mut h = Harness::start(store, NO_POLL).await;
    assert_eq!(
        h.orch.submit_selection("A").await,
        Err(OrchestratorError::NoActiveSelection)
    );

    h.store.emit(h.job_id, waiting());
    h.wait_for(|ev| matches!(ev, OrchestratorEvent::ShowPicker { .. }))
        .await;
    h.orch.submit_selection("A").await.unwrap();
    assert_eq!(
        h.orch.submit_selection("B").await,
        Err(OrchestratorError::NoActiveSelection)
    );
    assert_eq!(h.store.writes.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn waiting_without_formats_does_not_open_picker() {
    let mut h = Harness::start(store(), NO_POLL).await;

    h.store.emit(h.job_id, JobPatch::status(JobStatus::WaitingForSelection));
    h.wait_for_status(JobStatus::WaitingForSelection).await;
    assert_eq!(h.pickers(), 0);
    assert_eq!(
        h.orch.submit_selection("A").await,
        Err(OrchestratorError::NoActiveSelection)
    );

    // Formats arrive later: the picker opens then.
    h.store.emit(h.job_id, waiting());
    h.wait_for(|ev| matches!(ev, OrchestratorEvent::ShowPicker { .. }))
        .await;
    assert_eq!(h.pickers(), 1);
}

#[tokio::test]
async fn unknown_format_keeps_gate_open() {
    let mut h = Harness::start(store(), NO_POLL).await;
    h.store.emit(h.job_id, waiting());
    h.wait_for(|ev| matches!(ev, OrchestratorEvent::ShowPicker { .. }))
        .await;

    assert_eq!(
        h.orch.submit_selection("Z").await,
        Err(OrchestratorError::UnknownFormat("Z".to_string()))
    );
    assert!(h.store.writes.lock().unwrap().is_empty());
    h.orch.submit_selection("B").await.unwrap();
}

#[tokio::test]
async fn failed_selection_write_can_be_retried() {
    let mut h = Harness::start(store(), NO_POLL).await;
    let id = h.job_id;
    h.store.emit(id, waiting());
    h.wait_for(|ev| matches!(ev, OrchestratorEvent::ShowPicker { .. }))
        .await;

    h.store.fail_updates(true);
    let err = h.orch.submit_selection("A").await.unwrap_err();
    assert!(matches!(err, OrchestratorError::SelectionNotSaved(_)));
    h.wait_for(|ev| {
        matches!(ev, OrchestratorEvent::Update(u)
            if u.log_line.as_deref().is_some_and(|l| l.starts_with("Could not save format selection")))
    })
    .await;
    assert_eq!(h.orch.active_job().await, Some(id));

    h.store.fail_updates(false);
    h.orch.submit_selection("A").await.unwrap();
    assert_eq!(h.store.row(id).unwrap().selected_format.as_deref(), Some("A"));

    h.store.emit(id, JobPatch::status(JobStatus::Completed));
    assert!(h.outcome().await.is_ok());
    h.drain_then_quiet(Duration::ZERO).await;
    assert_eq!(h.pickers(), 1);
}

#[tokio::test]
async fn dropped_start_releases_the_slot() {
    let store = store();
    let (orch, mut events) = Orchestrator::new(store.clone(), FAST_POLL);

    let input = JobInput::detect("https://vimeo.com/5", "Downloads");
    let abandoned = tokio::time::timeout(Duration::from_millis(50), orch.start(input)).await;
    assert!(abandoned.is_err());

    assert_eq!(orch.active_job().await, None);
    assert!(store.feed.is_empty());
    assert_eq!(ScriptedStore::count(&store.unsubscribes), 1);

    let mut last = None;
    while let Ok(ev) = events.try_recv() {
        last = Some(ev);
    }
    match last {
        Some(OrchestratorEvent::Failed { job_id, reason }) => {
            assert_eq!(job_id, 1);
            assert_eq!(reason, CANCELLED);
        }
        other => panic!("expected a cancellation event, got {other:?}"),
    }

    let mut next = Harness::start_with(store, orch, events, "https://vimeo.com/6").await;
    assert_eq!(next.job_id, 2);
    next.store.emit(next.job_id, JobPatch::status(JobStatus::Completed));
    assert!(next.outcome().await.is_ok());
}
