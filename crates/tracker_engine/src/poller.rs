//! Cancellable poll loop driving a [`PollSession`].
//!
//! Each session runs on its own task. Poll requests are spawned so a slow
//! backend never delays the timer; every response carries the tick that
//! issued it and the session drops responses older than the last one
//! applied. A liveness flag shared with the [`PollerHandle`] is checked
//! before every state update, and publication happens under the snapshot
//! lock, so nothing from a stopped poller becomes visible.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::future::join3;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracker_core::{
    update, ChunkStatusReport, Effect, FileHandle, Msg, PollReport, PollSession, PollerState,
    RegenerationJob, SessionSnapshot, StageKind, StopReason,
};
use tracker_logging::{tracker_debug, tracker_info};

use crate::{ApiError, PollSettings, StageApi, StageProbe, TrackerEvent, TrackerSink};

pub struct JobPoller {
    api: Arc<dyn StageApi>,
    probe: StageProbe,
    settings: PollSettings,
    sink: Arc<dyn TrackerSink>,
}

impl JobPoller {
    pub fn new(api: Arc<dyn StageApi>, settings: PollSettings, sink: Arc<dyn TrackerSink>) -> Self {
        Self {
            probe: StageProbe::new(api.clone()),
            api,
            settings: settings.normalized(),
            sink,
        }
    }

    pub fn settings(&self) -> &PollSettings {
        &self.settings
    }

    /// Spawns a running session. `origin` is the instant the timeout ceiling
    /// counts from: job submission, or now for passive sessions.
    ///
    /// Must be called within a tokio runtime.
    pub fn start(
        &self,
        file: FileHandle,
        stage: StageKind,
        job: Option<RegenerationJob>,
        origin: Instant,
    ) -> PollerHandle {
        let session = PollSession::new(file.clone(), stage, self.settings.timeout);
        let (mut session, _) = update(session, Msg::Start { job });
        session.consume_dirty();

        let (snapshot_tx, snapshot_rx) = watch::channel(session.view());
        let shared = Arc::new(Shared {
            alive: AtomicBool::new(true),
            snapshot: snapshot_tx,
            sink: self.sink.clone(),
        });
        let cancel = CancellationToken::new();
        let worker = Worker {
            api: self.api.clone(),
            probe: self.probe.clone(),
            settings: self.settings.clone(),
            shared: shared.clone(),
            cancel: cancel.clone(),
        };

        tracker_info!(
            "polling {file}/{stage} every {:?} (job {})",
            self.settings.interval,
            session.job().map(RegenerationJob::label).unwrap_or("none")
        );
        let task = tokio::spawn(worker.run(session, origin));

        PollerHandle {
            file,
            stage,
            shared,
            cancel,
            snapshot_rx,
            task,
        }
    }
}

/// State shared between a poll task and its handle.
struct Shared {
    alive: AtomicBool,
    snapshot: watch::Sender<SessionSnapshot>,
    sink: Arc<dyn TrackerSink>,
}

impl Shared {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Publishes `next` unless the poller was stopped. Returns false once stopped.
    ///
    /// Events are decided under the snapshot lock and emitted after it is
    /// released, so a sink may read snapshots.
    fn publish(&self, next: SessionSnapshot) -> bool {
        let mut alive = true;
        let mut events = Vec::new();
        self.snapshot.send_if_modified(|current| {
            if !self.is_alive() {
                alive = false;
                return false;
            }
            if *current == next {
                return false;
            }
            if current.display != next.display {
                events.push(TrackerEvent::DisplayChanged {
                    file: next.file.clone(),
                    stage: next.stage,
                    display: next.display.clone(),
                });
            }
            if current.data.is_none() {
                if let Some(data) = &next.data {
                    events.push(TrackerEvent::DataReady {
                        file: next.file.clone(),
                        stage: next.stage,
                        summary: data.summary(),
                    });
                }
            }
            *current = next;
            true
        });
        // A stop that landed in between already reported the cancellation.
        if self.is_alive() {
            self.emit_all(events);
        }
        alive
    }

    /// Clears the liveness flag and marks a non-terminal snapshot cancelled.
    /// Returns whether the poller was still live.
    fn stop(&self) -> bool {
        let mut was_alive = false;
        let mut cancelled = None;
        self.snapshot.send_if_modified(|current| {
            was_alive = self.alive.swap(false, Ordering::AcqRel);
            if !was_alive || !current.mark_cancelled() {
                return false;
            }
            cancelled = Some(TrackerEvent::Cancelled {
                file: current.file.clone(),
                stage: current.stage,
            });
            true
        });
        self.emit_all(cancelled);
        was_alive
    }

    fn emit_all(&self, events: impl IntoIterator<Item = TrackerEvent>) {
        for event in events {
            self.sink.emit(event);
        }
    }
}

struct Worker {
    api: Arc<dyn StageApi>,
    probe: StageProbe,
    settings: PollSettings,
    shared: Arc<Shared>,
    cancel: CancellationToken,
}

impl Worker {
    async fn run(self, mut session: PollSession, origin: Instant) {
        let mut in_flight: JoinSet<Msg> = JoinSet::new();
        let mut ticker = time::interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut ticking = true;

        loop {
            let msg = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => match joined {
                    Ok(msg) => msg,
                    Err(_) => continue,
                },
                _ = ticker.tick(), if ticking => Msg::Tick { elapsed: origin.elapsed() },
            };

            if !self.shared.is_alive() {
                break;
            }
            let stale_before = session.stale_discarded();
            let (next, effects) = update(session, msg);
            session = next;
            if session.stale_discarded() > stale_before {
                tracker_debug!(
                    "{}/{}: discarded stale poll response",
                    session.file(),
                    session.stage()
                );
            }
            if session.consume_dirty() && !self.shared.publish(session.view()) {
                break;
            }

            for effect in effects {
                match effect {
                    Effect::Poll { tick } => self.spawn_poll(&mut in_flight, &session, tick),
                    Effect::FetchFullData => self.spawn_full_fetch(&mut in_flight, &session),
                    Effect::StopTimer { reason } => {
                        ticking = false;
                        log_stop(&session, reason);
                    }
                }
            }

            if session.is_finished() {
                break;
            }
        }
        in_flight.abort_all();
    }

    fn spawn_poll(&self, in_flight: &mut JoinSet<Msg>, session: &PollSession, tick: u64) {
        let api = self.api.clone();
        let probe = self.probe.clone();
        let file = session.file().clone();
        let stage = session.stage();
        in_flight.spawn(async move {
            let report = poll_once(api.as_ref(), &probe, &file, stage).await;
            Msg::PollResolved { tick, report }
        });
    }

    fn spawn_full_fetch(&self, in_flight: &mut JoinSet<Msg>, session: &PollSession) {
        let api = self.api.clone();
        let file = session.file().clone();
        let stage = session.stage();
        let limit = self.settings.full_fetch_limit;
        in_flight.spawn(async move {
            let result = api
                .stage_content(&file, stage, limit, 0)
                .await
                .map_err(|err| err.to_string());
            Msg::FullDataFetched(result)
        });
    }
}

async fn poll_once(
    api: &dyn StageApi,
    probe: &StageProbe,
    file: &FileHandle,
    stage: StageKind,
) -> PollReport {
    let chunks = async {
        if stage.reports_chunks() {
            api.chunk_status(file).await
        } else {
            Ok::<Option<ChunkStatusReport>, ApiError>(None)
        }
    };
    let (availability, status, chunks) =
        join3(probe.probe(file, stage), api.processing_status(file), chunks).await;

    // Transient failures are retried by the next tick.
    let status = status
        .inspect_err(|err| tracker_debug!("processing status for {file} unavailable: {err}"))
        .ok();
    let chunks = chunks
        .inspect_err(|err| tracker_debug!("chunk status for {file} unavailable: {err}"))
        .ok()
        .flatten();

    PollReport {
        availability,
        status,
        chunks,
    }
}

fn log_stop(session: &PollSession, reason: StopReason) {
    let file = session.file();
    let stage = session.stage();
    match reason {
        StopReason::Converged => tracker_info!("{file}/{stage}: available, fetching full data"),
        StopReason::TimedOut => tracker_info!(
            "{file}/{stage}: no result within {:?}, giving up",
            session.timeout()
        ),
        StopReason::Failed => tracker_info!("{file}/{stage}: backend reported failure"),
        StopReason::Cancelled => tracker_info!("{file}/{stage}: poller cancelled"),
    }
}

/// Owner-side handle of a running poll session. Dropping it stops the poller.
pub struct PollerHandle {
    file: FileHandle,
    stage: StageKind,
    shared: Arc<Shared>,
    cancel: CancellationToken,
    snapshot_rx: watch::Receiver<SessionSnapshot>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    pub fn file(&self) -> &FileHandle {
        &self.file
    }

    pub fn stage(&self) -> StageKind {
        self.stage
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_rx.clone()
    }

    pub fn state(&self) -> PollerState {
        self.snapshot_rx.borrow().poller_state
    }

    pub fn is_running(&self) -> bool {
        self.state() == PollerState::Running
    }

    /// The session is bound to a regeneration job rather than passively waiting.
    pub fn has_job(&self) -> bool {
        self.snapshot_rx.borrow().job.is_some()
    }

    pub fn is_alive(&self) -> bool {
        self.shared.is_alive()
    }

    /// The poll task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops the poller. Returns false if it was already stopped, in which
    /// case nothing happens.
    pub fn stop(&self) -> bool {
        let was_alive = self.shared.stop();
        self.cancel.cancel();
        if was_alive {
            tracker_debug!("stopped poller for {}/{}", self.file, self.stage);
        }
        was_alive
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.shared.alive.store(false, Ordering::Release);
        self.cancel.cancel();
    }
}
