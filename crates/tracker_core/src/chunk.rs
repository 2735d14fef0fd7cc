use std::collections::{BTreeMap, BTreeSet};

/// Status of one graph-extraction work unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChunkStatus {
    #[default]
    Pending,
    Completed,
    FailedRetryable,
    FailedPermanent,
}

impl ChunkStatus {
    /// Terminal statuses never change again within one attempt.
    pub fn is_terminal(self) -> bool {
        matches!(self, ChunkStatus::Completed | ChunkStatus::FailedPermanent)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkState {
    /// 1-based position of the chunk within the file.
    pub index: u32,
    pub status: ChunkStatus,
    pub triple_count: Option<u32>,
    pub attempt_count: Option<u32>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChunkDetail {
    pub triples: Option<u32>,
    pub attempts: Option<u32>,
}

/// Normalized chunk-status payload as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChunkStatusReport {
    pub total_chunks: Option<u32>,
    pub completed: BTreeSet<u32>,
    pub failed: BTreeSet<u32>,
    pub failed_permanent: BTreeSet<u32>,
    pub details: BTreeMap<u32, ChunkDetail>,
    /// Error messages by chunk index. May still list chunks that later
    /// completed.
    pub errors: BTreeMap<u32, String>,
}

impl ChunkStatusReport {
    /// Completion wins over any failure listing; a permanent failure wins
    /// over a retryable one.
    pub fn status_of(&self, index: u32) -> ChunkStatus {
        if self.completed.contains(&index) {
            ChunkStatus::Completed
        } else if self.failed_permanent.contains(&index) {
            ChunkStatus::FailedPermanent
        } else if self.failed.contains(&index) {
            ChunkStatus::FailedRetryable
        } else {
            ChunkStatus::Pending
        }
    }

    /// True when the report carries no chunk information at all.
    pub fn is_empty(&self) -> bool {
        self.total_chunks.unwrap_or(0) == 0
            && self.completed.is_empty()
            && self.failed.is_empty()
            && self.failed_permanent.is_empty()
            && self.details.is_empty()
    }

    fn mentioned_indices(&self) -> BTreeSet<u32> {
        let mut indices: BTreeSet<u32> = self
            .total_chunks
            .map(|total| (1..=total).collect())
            .unwrap_or_default();
        indices.extend(self.completed.iter().copied());
        indices.extend(self.failed.iter().copied());
        indices.extend(self.failed_permanent.iter().copied());
        indices.extend(self.details.keys().copied());
        indices.remove(&0);
        indices
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChunkCounts {
    pub completed: u32,
    pub failed_retryable: u32,
    pub failed_permanent: u32,
    pub pending: u32,
}

/// One cell of the rendered chunk grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkCell {
    pub index: u32,
    pub status: ChunkStatus,
}

/// Accumulated chunk states for one extraction attempt.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChunkStatusModel {
    total_chunks: Option<u32>,
    chunks: BTreeMap<u32, ChunkState>,
}

impl ChunkStatusModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_report(report: &ChunkStatusReport) -> Self {
        let mut model = Self::new();
        model.merge(report);
        model
    }

    pub fn total_chunks(&self) -> Option<u32> {
        self.total_chunks
    }

    pub fn chunk(&self, index: u32) -> Option<&ChunkState> {
        self.chunks.get(&index)
    }

    /// Known chunks in ascending index order.
    pub fn chunks(&self) -> impl Iterator<Item = &ChunkState> {
        self.chunks.values()
    }

    /// Applies a newer observation. Chunks already in a terminal status keep
    /// it; returns how many reported regressions were refused.
    pub fn merge(&mut self, report: &ChunkStatusReport) -> usize {
        if report.total_chunks.is_some() {
            self.total_chunks = report.total_chunks;
        }

        let mut refused = 0;
        for index in report.mentioned_indices() {
            let reported = report.status_of(index);
            let detail = report.details.get(&index).copied().unwrap_or_default();
            let error = report.errors.get(&index).cloned();

            let state = self.chunks.entry(index).or_insert_with(|| ChunkState {
                index,
                status: ChunkStatus::Pending,
                triple_count: None,
                attempt_count: None,
                error_message: None,
            });

            if state.status.is_terminal() && reported != state.status {
                refused += 1;
            } else {
                state.status = reported;
            }

            if detail.triples.is_some() {
                state.triple_count = detail.triples;
            }
            if detail.attempts.is_some() {
                state.attempt_count = detail.attempts;
            }
            if error.is_some() {
                state.error_message = error;
            }
        }
        refused
    }

    pub fn counts(&self) -> ChunkCounts {
        let mut counts = ChunkCounts::default();
        for cell in self.grid() {
            match cell.status {
                ChunkStatus::Completed => counts.completed += 1,
                ChunkStatus::FailedRetryable => counts.failed_retryable += 1,
                ChunkStatus::FailedPermanent => counts.failed_permanent += 1,
                ChunkStatus::Pending => counts.pending += 1,
            }
        }
        counts
    }

    /// Share of chunks that completed; `None` without a known total.
    pub fn progress_percent(&self) -> Option<u8> {
        let total = self.total_chunks.filter(|t| *t > 0)?;
        let completed = self.counts().completed.min(total);
        Some(((u64::from(completed) * 100) / u64::from(total)) as u8)
    }

    /// One cell per chunk `1..=total`, ascending. Empty when the total is
    /// unknown or zero.
    pub fn grid(&self) -> Vec<ChunkCell> {
        let total = match self.total_chunks {
            Some(total) if total > 0 => total,
            _ => return Vec::new(),
        };
        (1..=total)
            .map(|index| ChunkCell {
                index,
                status: self
                    .chunks
                    .get(&index)
                    .map(|state| state.status)
                    .unwrap_or_default(),
            })
            .collect()
    }
}
