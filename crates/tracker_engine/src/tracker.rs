use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::Instant;
use tracker_core::{
    Availability, DisplayState, FileHandle, RegenerationJob, SessionSnapshot, StageKind,
};
use tracker_logging::{tracker_info, tracker_warn};

use crate::{
    JobPoller, PollSettings, PollerHandle, SessionKey, StageApi, StageProbe, TrackerError,
    TrackerSink,
};

#[derive(Default)]
struct Sessions {
    active: HashMap<SessionKey, PollerHandle>,
    /// Pairs with a regenerate request awaiting the backend's answer.
    submitting: HashSet<SessionKey>,
}

/// Entry point for the UI layer: tracks stage availability per (file, stage)
/// pair and drives regeneration. Owned by the active view; dropping it stops
/// every session.
pub struct Tracker {
    api: Arc<dyn StageApi>,
    probe: StageProbe,
    poller: JobPoller,
    sessions: Mutex<Sessions>,
}

impl Tracker {
    pub fn new(api: Arc<dyn StageApi>, settings: PollSettings, sink: Arc<dyn TrackerSink>) -> Self {
        Self {
            probe: StageProbe::new(api.clone()),
            poller: JobPoller::new(api.clone(), settings, sink),
            api,
            sessions: Mutex::new(Sessions::default()),
        }
    }

    pub fn settings(&self) -> &PollSettings {
        self.poller.settings()
    }

    fn sessions(&self) -> MutexGuard<'_, Sessions> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub async fn probe(&self, file: &FileHandle, stage: StageKind) -> Availability {
        self.probe.probe(file, stage).await
    }

    pub async fn probe_all(&self, file: &FileHandle) -> Vec<(StageKind, Availability)> {
        self.probe.probe_all(file).await
    }

    /// Starts passively watching a pair until its stage becomes available.
    ///
    /// A running session for the pair is kept and shared; a finished one is
    /// replaced. Must be called within a tokio runtime.
    pub fn start_tracking(
        &self,
        file: &FileHandle,
        stage: StageKind,
    ) -> watch::Receiver<SessionSnapshot> {
        let key = (file.clone(), stage);
        let mut sessions = self.sessions();
        if let Some(existing) = sessions.active.get(&key) {
            if existing.is_running() {
                return existing.subscribe();
            }
        }
        let handle = self.poller.start(file.clone(), stage, None, Instant::now());
        let rx = handle.subscribe();
        let previous = sessions.active.insert(key, handle);
        drop(sessions);
        if let Some(previous) = previous {
            previous.stop();
        }
        rx
    }

    /// Stops and forgets the session for a pair. Returns false when nothing
    /// was tracked, so a repeated call is a no-op.
    pub fn stop_tracking(&self, file: &FileHandle, stage: StageKind) -> bool {
        let removed = self.sessions().active.remove(&(file.clone(), stage));
        match removed {
            Some(handle) => {
                handle.stop();
                true
            }
            None => false,
        }
    }

    /// Stops every session, as on view teardown. Returns how many were tracked.
    pub fn stop_all(&self) -> usize {
        let drained: Vec<PollerHandle> = self.sessions().active.drain().map(|(_, h)| h).collect();
        for handle in &drained {
            handle.stop();
        }
        drained.len()
    }

    /// Submits a regenerate request and starts polling the resulting job,
    /// replacing any passive or finished session for the pair.
    ///
    /// Fails with [`TrackerError::Conflict`] while a job for the same pair is
    /// being submitted or polled. Must be called within a tokio runtime.
    pub async fn regenerate(
        &self,
        file: &FileHandle,
        stage: StageKind,
    ) -> Result<RegenerationJob, TrackerError> {
        let key: SessionKey = (file.clone(), stage);
        let _reservation = self.reserve(&key)?;

        let origin = Instant::now();
        let submitted_at = Utc::now();
        let ack = self.api.regenerate(file, stage).await.map_err(|err| {
            tracker_warn!("regenerate {file}/{stage} rejected: {err}");
            TrackerError::Submission {
                stage,
                message: err.message,
            }
        })?;

        let job = RegenerationJob::new(ack.job_id, stage, submitted_at);
        tracker_info!(
            "regenerate {file}/{stage} accepted as job {}: {}",
            job.label(),
            ack.message
        );

        let handle = self
            .poller
            .start(file.clone(), stage, Some(job.clone()), origin);
        let previous = self.sessions().active.insert(key, handle);
        if let Some(previous) = previous {
            previous.stop();
        }
        Ok(job)
    }

    fn reserve(&self, key: &SessionKey) -> Result<SubmitReservation<'_>, TrackerError> {
        let mut sessions = self.sessions();
        let job_running = sessions
            .active
            .get(key)
            .is_some_and(|handle| handle.is_running() && handle.has_job());
        if job_running || !sessions.submitting.insert(key.clone()) {
            return Err(TrackerError::Conflict {
                file: key.0.clone(),
                stage: key.1,
            });
        }
        Ok(SubmitReservation {
            tracker: self,
            key: key.clone(),
        })
    }

    pub fn snapshot(&self, file: &FileHandle, stage: StageKind) -> Option<SessionSnapshot> {
        self.sessions()
            .active
            .get(&(file.clone(), stage))
            .map(PollerHandle::snapshot)
    }

    pub fn display(&self, file: &FileHandle, stage: StageKind) -> Option<DisplayState> {
        self.snapshot(file, stage).map(|snapshot| snapshot.display)
    }

    pub fn subscribe(
        &self,
        file: &FileHandle,
        stage: StageKind,
    ) -> Option<watch::Receiver<SessionSnapshot>> {
        self.sessions()
            .active
            .get(&(file.clone(), stage))
            .map(PollerHandle::subscribe)
    }

    pub fn is_tracking(&self, file: &FileHandle, stage: StageKind) -> bool {
        self.sessions().active.contains_key(&(file.clone(), stage))
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        self.stop_all();
    }
}

/// Marks a pair as submitting until dropped, including when the submitting
/// future is abandoned mid-request.
struct SubmitReservation<'a> {
    tracker: &'a Tracker,
    key: SessionKey,
}

impl Drop for SubmitReservation<'_> {
    fn drop(&mut self) {
        self.tracker.sessions().submitting.remove(&self.key);
    }
}
