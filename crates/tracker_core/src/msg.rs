use std::time::Duration;

use crate::{Availability, ChunkStatusReport, ProcessingStatus, RegenerationJob, StageData};

/// Everything one poll tick learned about the tracked stage.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PollReport {
    pub availability: Availability,
    /// `None` when the processing-status request failed.
    pub status: Option<ProcessingStatus>,
    /// Detailed chunk status; only fetched for the graph stage.
    pub chunks: Option<ChunkStatusReport>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Begin polling, optionally bound to a regeneration job.
    Start { job: Option<RegenerationJob> },
    /// Poll timer fired. `elapsed` counts from job submission, or from the
    /// start of polling for passive sessions.
    Tick { elapsed: Duration },
    /// Results of the poll issued by tick number `tick`.
    PollResolved { tick: u64, report: PollReport },
    /// Result of the final full-data fetch after convergence.
    FullDataFetched(Result<StageData, String>),
    /// Explicit stop: view closed, file switched or session superseded.
    Cancel,
    /// Carries no change; used where a message is required but nothing happened.
    NoOp,
}
