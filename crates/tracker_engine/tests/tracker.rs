mod common;

use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::time::Duration;

use common::{graph_data, init_logging, progress, Call, CollectingSink, FakeStageApi};
use pretty_assertions::assert_eq;
use tokio::time::sleep;
use tracker_core::{
    Availability, ChunkCounts, ChunkStatusReport, DisplayState, FileHandle, PollerState,
    RunStatus, StageKind, PENDING_JOB_LABEL,
};
use tracker_engine::{
    ApiError, PollSettings, RegenerateAck, Tracker, TrackerError, TrackerEvent, TrackerSink,
};

fn tracker(api: &Arc<FakeStageApi>, sink: &Arc<CollectingSink>) -> Tracker {
    Tracker::new(api.clone(), PollSettings::default(), sink.clone())
}

#[tokio::test(start_paused = true)]
async fn never_attempted_stage_shows_never_generated() {
    init_logging();
    let api = FakeStageApi::shared();
    let sink = CollectingSink::shared();
    let tracker = tracker(&api, &sink);
    let file = FileHandle::new("notes.md");

    assert_eq!(
        tracker.probe(&file, StageKind::Graph).await,
        Availability::Unavailable
    );
    let rx = tracker.start_tracking(&file, StageKind::Graph);
    sleep(Duration::from_secs(1)).await;

    assert_eq!(rx.borrow().display, DisplayState::NeverGenerated);
    assert_eq!(
        tracker.display(&file, StageKind::Graph),
        Some(DisplayState::NeverGenerated)
    );
    assert_eq!(tracker.display(&file, StageKind::Vector), None);
}

#[tokio::test(start_paused = true)]
async fn probe_failure_is_unknown_not_unavailable() {
    init_logging();
    let api = FakeStageApi::shared();
    api.push_probe(Err(ApiError::network("connection refused")));
    let tracker = tracker(&api, &CollectingSink::shared());

    let availability = tracker.probe(&FileHandle::new("f1"), StageKind::Storage).await;
    assert!(matches!(availability, Availability::Unknown { .. }));
}

#[tokio::test(start_paused = true)]
async fn probe_all_reports_every_stage_in_order() {
    init_logging();
    let api = FakeStageApi::shared();
    api.push_probe(Ok(common::vectors(3)));
    let tracker = tracker(&api, &CollectingSink::shared());

    let stages: Vec<StageKind> = tracker
        .probe_all(&FileHandle::new("f1"))
        .await
        .into_iter()
        .map(|(stage, _)| stage)
        .collect();
    assert_eq!(stages, StageKind::ALL.to_vec());
    assert_eq!(api.calls().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn second_regenerate_conflicts_and_keeps_one_timer() {
    init_logging();
    let api = FakeStageApi::shared();
    api.set_status_fallback(
        Duration::ZERO,
        Ok(progress(StageKind::Vector, RunStatus::Processing, Some(20))),
    );
    let tracker = tracker(&api, &CollectingSink::shared());
    let file = FileHandle::new("f1");

    let job = tracker
        .regenerate(&file, StageKind::Vector)
        .await
        .expect("first submission accepted");
    assert_eq!(job.label(), "job-1");

    let err = tracker
        .regenerate(&file, StageKind::Vector)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        TrackerError::Conflict {
            file: file.clone(),
            stage: StageKind::Vector,
        }
    );

    sleep(Duration::from_secs(15)).await;
    assert!(tracker.regenerate(&file, StageKind::Vector).await.is_err());

    sleep(Duration::from_millis(16_500)).await;
    // One tick every 3s over 31.5s: t = 0, 3, ..., 30.
    assert_eq!(api.count(&Call::Status), 11);
    assert_eq!(api.count(&Call::Regenerate(StageKind::Vector)), 1);
}

#[tokio::test(start_paused = true)]
async fn regenerate_while_submitting_conflicts() {
    init_logging();
    let api = FakeStageApi::shared();
    api.set_regenerate(
        Duration::from_secs(1),
        Ok(RegenerateAck {
            job_id: None,
            message: "queued".into(),
        }),
    );
    let tracker = tracker(&api, &CollectingSink::shared());
    let file = FileHandle::new("f1");

    let (first, second) = tokio::join!(
        tracker.regenerate(&file, StageKind::Graph),
        tracker.regenerate(&file, StageKind::Graph)
    );
    let job = first.expect("first submission accepted");
    assert_eq!(job.job_id, None);
    assert_eq!(job.label(), PENDING_JOB_LABEL);
    assert!(matches!(second, Err(TrackerError::Conflict { .. })));
    assert_eq!(api.count(&Call::Regenerate(StageKind::Graph)), 1);

    // Different stages of the same file are independent.
    assert!(tracker.regenerate(&file, StageKind::Vector).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn rejected_regenerate_surfaces_backend_message() {
    init_logging();
    let api = FakeStageApi::shared();
    api.set_regenerate(
        Duration::ZERO,
        Err(ApiError::status(409, "storage stage missing")),
    );
    let tracker = tracker(&api, &CollectingSink::shared());
    let file = FileHandle::new("f1");

    let err = tracker
        .regenerate(&file, StageKind::Vector)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        TrackerError::Submission {
            stage: StageKind::Vector,
            message: "storage stage missing".into(),
        }
    );
    assert!(!tracker.is_tracking(&file, StageKind::Vector));

    api.set_regenerate(Duration::ZERO, Ok(RegenerateAck::default()));
    assert!(tracker.regenerate(&file, StageKind::Vector).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn leftover_failure_does_not_end_resubmitted_job() {
    init_logging();
    let api = FakeStageApi::shared();
    api.push_status(
        Duration::ZERO,
        Ok(progress(StageKind::Vector, RunStatus::Failed, None)),
    );
    api.set_status_fallback(
        Duration::ZERO,
        Ok(progress(StageKind::Vector, RunStatus::Processing, Some(50))),
    );
    api.set_full_data(Ok(common::vectors(5)));
    let tracker = tracker(&api, &CollectingSink::shared());
    let file = FileHandle::new("f1");

    tracker
        .regenerate(&file, StageKind::Vector)
        .await
        .expect("accepted");
    sleep(Duration::from_secs(1)).await;
    let snapshot = tracker.snapshot(&file, StageKind::Vector).expect("tracked");
    assert_eq!(snapshot.poller_state, PollerState::Running);
    assert!(matches!(snapshot.display, DisplayState::Generating { .. }));

    sleep(Duration::from_secs(6)).await;
    api.set_probe_fallback(Ok(common::vectors(5)));
    sleep(Duration::from_secs(3)).await;

    let snapshot = tracker.snapshot(&file, StageKind::Vector).expect("tracked");
    assert_eq!(snapshot.poller_state, PollerState::Converged);
    assert_eq!(
        snapshot.display,
        DisplayState::Completed(common::vectors(5).summary())
    );
    assert!(api.count(&Call::Status) >= 3);
}

#[tokio::test(start_paused = true)]
async fn timed_out_job_can_be_resubmitted() {
    init_logging();
    let api = FakeStageApi::shared();
    api.set_status_fallback(
        Duration::ZERO,
        Ok(progress(StageKind::Vector, RunStatus::Processing, Some(10))),
    );
    let tracker = tracker(&api, &CollectingSink::shared());
    let file = FileHandle::new("f1");

    tracker
        .regenerate(&file, StageKind::Vector)
        .await
        .expect("accepted");
    sleep(Duration::from_secs(301)).await;
    assert_eq!(
        tracker.display(&file, StageKind::Vector),
        Some(DisplayState::TimedOut)
    );

    tracker
        .regenerate(&file, StageKind::Vector)
        .await
        .expect("resubmission accepted");
    let snapshot = tracker.snapshot(&file, StageKind::Vector).expect("tracked");
    assert_eq!(snapshot.poller_state, PollerState::Running);
    assert!(matches!(snapshot.display, DisplayState::Generating { .. }));
    assert_eq!(api.count(&Call::Regenerate(StageKind::Vector)), 2);
}

#[tokio::test(start_paused = true)]
async fn chunk_grid_tracks_progress_until_probe_flips() {
    init_logging();
    let api = FakeStageApi::shared();
    api.set_chunks_fallback(Ok(Some(ChunkStatusReport {
        total_chunks: Some(10),
        completed: (1..=7).collect(),
        failed_permanent: [8].into(),
        ..ChunkStatusReport::default()
    })));
    api.set_status_fallback(
        Duration::ZERO,
        Ok(progress(StageKind::Graph, RunStatus::Processing, Some(70))),
    );
    let tracker = tracker(&api, &CollectingSink::shared());
    let file = FileHandle::new("f1");

    tracker
        .regenerate(&file, StageKind::Graph)
        .await
        .expect("accepted");
    sleep(Duration::from_secs(1)).await;

    let snapshot = tracker.snapshot(&file, StageKind::Graph).expect("tracked");
    assert_eq!(snapshot.chunk_grid().len(), 10);
    assert_eq!(
        snapshot.chunk_counts(),
        Some(ChunkCounts {
            completed: 7,
            failed_retryable: 0,
            failed_permanent: 1,
            pending: 2,
        })
    );
    assert_eq!(
        snapshot.display,
        DisplayState::Generating {
            progress_percent: Some(70),
            next_job_id: None,
        }
    );

    api.set_probe_fallback(Ok(graph_data(2)));
    api.set_full_data(Ok(graph_data(2)));
    sleep(Duration::from_secs(3)).await;

    let snapshot = tracker.snapshot(&file, StageKind::Graph).expect("tracked");
    assert_eq!(
        snapshot.display,
        DisplayState::Completed(graph_data(2).summary())
    );
    assert_eq!(snapshot.chunk_counts().map(|c| c.pending), Some(2));
}

#[tokio::test(start_paused = true)]
async fn regenerate_supersedes_passive_session() {
    init_logging();
    let api = FakeStageApi::shared();
    let sink = CollectingSink::shared();
    let tracker = tracker(&api, &sink);
    let file = FileHandle::new("f1");

    tracker.start_tracking(&file, StageKind::Storage);
    sleep(Duration::from_secs(1)).await;
    tracker
        .regenerate(&file, StageKind::Storage)
        .await
        .expect("passive session does not conflict");

    assert_eq!(sink.cancellations(), 1);
    let snapshot = tracker.snapshot(&file, StageKind::Storage).expect("tracked");
    assert!(snapshot.job.is_some());
    assert_eq!(snapshot.poller_state, PollerState::Running);
}

#[tokio::test(start_paused = true)]
async fn start_tracking_shares_running_session() {
    init_logging();
    let api = FakeStageApi::shared();
    let sink = CollectingSink::shared();
    let tracker = tracker(&api, &sink);
    let file = FileHandle::new("f1");

    let first = tracker.start_tracking(&file, StageKind::Vector);
    let second = tracker.start_tracking(&file, StageKind::Vector);
    sleep(Duration::from_millis(3500)).await;

    assert_eq!(sink.cancellations(), 0);
    assert_eq!(api.count(&Call::Status), 2);
    assert_eq!(*first.borrow(), *second.borrow());
}

#[tokio::test(start_paused = true)]
async fn stop_tracking_is_idempotent() {
    init_logging();
    let api = FakeStageApi::shared();
    let sink = CollectingSink::shared();
    let tracker = tracker(&api, &sink);
    let file = FileHandle::new("f1");

    let rx = tracker.start_tracking(&file, StageKind::Graph);
    sleep(Duration::from_secs(1)).await;

    assert!(tracker.stop_tracking(&file, StageKind::Graph));
    assert!(!tracker.stop_tracking(&file, StageKind::Graph));
    assert_eq!(sink.cancellations(), 1);
    assert_eq!(rx.borrow().poller_state, PollerState::Cancelled);
    assert!(!tracker.is_tracking(&file, StageKind::Graph));

    let before = api.calls().len();
    sleep(Duration::from_secs(10)).await;
    assert_eq!(api.calls().len(), before);
}

#[tokio::test(start_paused = true)]
async fn dropping_tracker_stops_every_session() {
    init_logging();
    let api = FakeStageApi::shared();
    let sink = CollectingSink::shared();
    let tracker = tracker(&api, &sink);
    let file = FileHandle::new("f1");

    tracker.start_tracking(&file, StageKind::Storage);
    tracker.start_tracking(&file, StageKind::Vector);
    sleep(Duration::from_secs(4)).await;
    assert_eq!(api.count(&Call::Status), 4);

    drop(tracker);
    sleep(Duration::from_secs(10)).await;
    assert_eq!(api.count(&Call::Status), 4);
    assert_eq!(sink.cancellations(), 2);
}

/// Looks the pair up through the tracker whenever its display changes.
#[derive(Default)]
struct LookupSink {
    tracker: OnceLock<Weak<Tracker>>,
    seen: Mutex<Vec<Option<DisplayState>>>,
}

impl TrackerSink for LookupSink {
    fn emit(&self, event: TrackerEvent) {
        let TrackerEvent::DisplayChanged { file, stage, .. } = event else {
            return;
        };
        if let Some(tracker) = self.tracker.get().and_then(Weak::upgrade) {
            let display = tracker.display(&file, stage);
            self.seen.lock().unwrap().push(display);
        }
    }
}

#[tokio::test(start_paused = true)]
async fn sink_may_query_tracker_from_events() {
    init_logging();
    let api = FakeStageApi::shared();
    api.set_status_fallback(
        Duration::ZERO,
        Ok(progress(StageKind::Vector, RunStatus::Processing, Some(40))),
    );
    let sink = Arc::new(LookupSink::default());
    let tracker = Arc::new(Tracker::new(
        api.clone(),
        PollSettings::default(),
        sink.clone(),
    ));
    let _ = sink.tracker.set(Arc::downgrade(&tracker));
    let file = FileHandle::new("f1");

    tracker.start_tracking(&file, StageKind::Vector);
    sleep(Duration::from_secs(1)).await;
    assert!(tracker.stop_tracking(&file, StageKind::Vector));

    assert_eq!(
        *sink.seen.lock().unwrap(),
        vec![Some(DisplayState::Generating {
            progress_percent: Some(40),
            next_job_id: None,
        })]
    );
}
