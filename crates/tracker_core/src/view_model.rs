use crate::{
    Availability, ChunkCell, ChunkCounts, ChunkStatusModel, FileHandle, JobStatus, PollerState,
    RegenerationJob, RunStatus, StageData, StageKind, StageProgress, StageSummary,
};

/// User-facing state of one (file, stage) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayState {
    NeverGenerated,
    Generating {
        progress_percent: Option<u8>,
        next_job_id: Option<String>,
    },
    Completed(StageSummary),
    Failed(String),
    TimedOut,
}

impl DisplayState {
    pub fn is_completed(&self) -> bool {
        matches!(self, DisplayState::Completed(_))
    }
}

const DEFAULT_FAILURE: &str = "processing failed";

/// Derives the display state. Availability wins over every other input.
pub fn present(
    availability: &Availability,
    job: Option<&RegenerationJob>,
    poller: PollerState,
    chunks: Option<&ChunkStatusModel>,
    progress: Option<&StageProgress>,
) -> DisplayState {
    if let Availability::Available(summary) = availability {
        return DisplayState::Completed(*summary);
    }

    let job_timed_out = job.is_some_and(|job| job.status == JobStatus::TimedOut);
    if poller == PollerState::TimedOut || job_timed_out {
        return DisplayState::TimedOut;
    }

    let backend_failed = progress.is_some_and(|p| p.status == RunStatus::Failed);
    if poller == PollerState::Failed || backend_failed {
        let message = progress
            .and_then(|p| p.message.clone())
            .unwrap_or_else(|| DEFAULT_FAILURE.to_string());
        return DisplayState::Failed(message);
    }

    let job_active = poller == PollerState::Running && job.is_some();
    let backend_working = progress.is_some_and(|p| p.status.indicates_work());
    if job_active || backend_working {
        return DisplayState::Generating {
            progress_percent: progress
                .and_then(|p| p.percent)
                .or_else(|| chunks.and_then(ChunkStatusModel::progress_percent)),
            next_job_id: progress.and_then(|p| p.next_job_id.clone()),
        };
    }

    DisplayState::NeverGenerated
}

/// Read-only view of a session published to the UI layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub file: FileHandle,
    pub stage: StageKind,
    pub poller_state: PollerState,
    pub job: Option<RegenerationJob>,
    pub availability: Availability,
    pub progress: Option<StageProgress>,
    pub chunks: Option<ChunkStatusModel>,
    pub data: Option<StageData>,
    pub full_data_error: Option<String>,
    pub stale_discarded: u64,
    pub display: DisplayState,
}

impl SessionSnapshot {
    /// Snapshot of a pair nothing is tracking yet.
    pub fn idle(file: FileHandle, stage: StageKind) -> Self {
        Self {
            file,
            stage,
            poller_state: PollerState::Idle,
            job: None,
            availability: Availability::Unavailable,
            progress: None,
            chunks: None,
            data: None,
            full_data_error: None,
            stale_discarded: 0,
            display: DisplayState::NeverGenerated,
        }
    }

    pub fn chunk_grid(&self) -> Vec<ChunkCell> {
        self.chunks
            .as_ref()
            .map(ChunkStatusModel::grid)
            .unwrap_or_default()
    }

    pub fn chunk_counts(&self) -> Option<ChunkCounts> {
        self.chunks
            .as_ref()
            .filter(|model| model.total_chunks().unwrap_or(0) > 0)
            .map(ChunkStatusModel::counts)
    }

    /// Applies an external cancellation. Returns false when the snapshot was
    /// already terminal.
    pub fn mark_cancelled(&mut self) -> bool {
        if self.poller_state.is_terminal() {
            return false;
        }
        self.poller_state = PollerState::Cancelled;
        self.display = present(
            &self.availability,
            self.job.as_ref(),
            self.poller_state,
            self.chunks.as_ref(),
            self.progress.as_ref(),
        );
        true
    }
}
