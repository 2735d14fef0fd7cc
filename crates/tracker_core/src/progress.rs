use crate::{ChunkStatusReport, StageKind};

/// Backend-reported run state of one pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunStatus {
    #[default]
    NotStarted,
    Queued,
    Processing,
    Completed,
    Failed,
}

impl RunStatus {
    /// Normalizes the status strings used by the different backend versions.
    pub fn parse(raw: &str, has_progress: bool) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "not_started" | "idle" | "none" | "" => RunStatus::NotStarted,
            "pending" | "queued" | "waiting" => RunStatus::Queued,
            "processing" | "running" | "in_progress" | "started" => RunStatus::Processing,
            "completed" | "complete" | "done" | "success" => RunStatus::Completed,
            "failed" | "error" => RunStatus::Failed,
            _ if has_progress => RunStatus::Processing,
            _ => RunStatus::NotStarted,
        }
    }

    /// The backend reports work that has been scheduled, is underway or has
    /// just finished but may not be queryable yet.
    pub fn indicates_work(self) -> bool {
        matches!(
            self,
            RunStatus::Queued | RunStatus::Processing | RunStatus::Completed
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StageProgress {
    pub status: RunStatus,
    /// Percentage in `0..=100`.
    pub percent: Option<u8>,
    pub message: Option<String>,
    /// Follow-up job scheduled to continue where the current one stopped.
    pub next_job_id: Option<String>,
}

/// Snapshot of the backend's processing-status endpoint for one file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessingStatus {
    pub storage: Option<StageProgress>,
    pub vector: Option<StageProgress>,
    pub graph: Option<StageProgress>,
    /// Chunk index lists embedded in the graph status block, without
    /// per-chunk details.
    pub graph_chunks: Option<ChunkStatusReport>,
}

impl ProcessingStatus {
    pub fn stage(&self, stage: StageKind) -> Option<&StageProgress> {
        match stage {
            StageKind::Storage => self.storage.as_ref(),
            StageKind::Vector => self.vector.as_ref(),
            StageKind::Graph => self.graph.as_ref(),
        }
    }
}

/// Clamps a backend progress value to a percentage. `fraction` marks values
/// reported on a `0..=1` scale.
pub fn normalize_percent(raw: f64, fraction: bool) -> Option<u8> {
    if !raw.is_finite() || raw < 0.0 {
        return None;
    }
    let scaled = if fraction { raw * 100.0 } else { raw };
    Some(scaled.round().min(100.0) as u8)
}
