//! Tracker core: pure data model, poll state machine and status presentation.
mod chunk;
mod effect;
mod job;
mod msg;
mod progress;
mod stage;
mod state;
mod update;
mod view_model;

pub use chunk::{
    ChunkCell, ChunkCounts, ChunkDetail, ChunkState, ChunkStatus, ChunkStatusModel,
    ChunkStatusReport,
};
pub use effect::{Effect, StopReason};
pub use job::{JobStatus, RegenerationJob, PENDING_JOB_LABEL};
pub use msg::{Msg, PollReport};
pub use progress::{normalize_percent, ProcessingStatus, RunStatus, StageProgress};
pub use stage::{
    Availability, FileHandle, GraphEntity, GraphRelation, StageData, StageKind, StageSummary,
    UnknownStage,
};
pub use state::{PollSession, PollerState};
pub use update::update;
pub use view_model::{present, DisplayState, SessionSnapshot};
