use std::time::Duration;

use crate::view_model::{present, SessionSnapshot};
use crate::{
    Availability, ChunkStatusModel, FileHandle, RegenerationJob, StageData, StageKind,
    StageProgress,
};

/// Lifecycle of a poller: `Idle -> Running -> {Converged, TimedOut, Failed, Cancelled}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollerState {
    #[default]
    Idle,
    Running,
    Converged,
    TimedOut,
    Failed,
    Cancelled,
}

impl PollerState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, PollerState::Idle | PollerState::Running)
    }
}

/// Tracking state for one (file, stage) pair. Mutated only through
/// [`crate::update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSession {
    file: FileHandle,
    stage: StageKind,
    timeout: Duration,
    pub(crate) state: PollerState,
    pub(crate) job: Option<RegenerationJob>,
    pub(crate) availability: Availability,
    pub(crate) progress: Option<StageProgress>,
    pub(crate) chunks: Option<ChunkStatusModel>,
    pub(crate) data: Option<StageData>,
    pub(crate) full_data_error: Option<String>,
    pub(crate) awaiting_full_data: bool,
    /// A job was submitted but the backend has not yet reported it queued or
    /// processing.
    pub(crate) awaiting_activity: bool,
    pub(crate) issued_ticks: u64,
    pub(crate) last_applied_tick: u64,
    pub(crate) stale_discarded: u64,
    pub(crate) refused_regressions: u64,
    dirty: bool,
}

impl PollSession {
    pub fn new(file: FileHandle, stage: StageKind, timeout: Duration) -> Self {
        Self {
            file,
            stage,
            timeout,
            state: PollerState::Idle,
            job: None,
            availability: Availability::Unavailable,
            progress: None,
            chunks: None,
            data: None,
            full_data_error: None,
            awaiting_full_data: false,
            awaiting_activity: false,
            issued_ticks: 0,
            last_applied_tick: 0,
            stale_discarded: 0,
            refused_regressions: 0,
            dirty: false,
        }
    }

    pub fn file(&self) -> &FileHandle {
        &self.file
    }

    pub fn stage(&self) -> StageKind {
        self.stage
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn state(&self) -> PollerState {
        self.state
    }

    pub fn job(&self) -> Option<&RegenerationJob> {
        self.job.as_ref()
    }

    pub fn availability(&self) -> &Availability {
        &self.availability
    }

    pub fn progress(&self) -> Option<&StageProgress> {
        self.progress.as_ref()
    }

    pub fn chunks(&self) -> Option<&ChunkStatusModel> {
        self.chunks.as_ref()
    }

    pub fn data(&self) -> Option<&StageData> {
        self.data.as_ref()
    }

    /// Number of poll responses dropped because a later tick already applied.
    pub fn stale_discarded(&self) -> u64 {
        self.stale_discarded
    }

    /// Chunk observations that tried to move a terminal chunk backwards.
    pub fn refused_regressions(&self) -> u64 {
        self.refused_regressions
    }

    /// The poller has reached a terminal state and owes no further fetch.
    pub fn is_finished(&self) -> bool {
        self.state.is_terminal() && !self.awaiting_full_data
    }

    pub fn view(&self) -> SessionSnapshot {
        let display = present(
            &self.availability,
            self.job.as_ref(),
            self.state,
            self.chunks.as_ref(),
            self.progress.as_ref(),
        );
        SessionSnapshot {
            file: self.file.clone(),
            stage: self.stage,
            poller_state: self.state,
            job: self.job.clone(),
            availability: self.availability.clone(),
            progress: self.progress.clone(),
            chunks: self.chunks.clone(),
            data: self.data.clone(),
            full_data_error: self.full_data_error.clone(),
            stale_discarded: self.stale_discarded,
            display,
        }
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Returns whether anything changed since the last call and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}
