use tracker_core::{ChunkStatusReport, FileHandle, ProcessingStatus, StageData, StageKind};

use crate::{ApiError, RegenerateAck};

/// Backend operations the tracker depends on.
#[async_trait::async_trait]
pub trait StageApi: Send + Sync {
    /// Fetches up to `limit` items of stage content starting at `offset`.
    async fn stage_content(
        &self,
        file: &FileHandle,
        stage: StageKind,
        limit: u32,
        offset: u32,
    ) -> Result<StageData, ApiError>;

    async fn regenerate(&self, file: &FileHandle, stage: StageKind)
        -> Result<RegenerateAck, ApiError>;

    async fn processing_status(&self, file: &FileHandle) -> Result<ProcessingStatus, ApiError>;

    /// `Ok(None)` when the backend reports no chunk granularity yet.
    async fn chunk_status(&self, file: &FileHandle)
        -> Result<Option<ChunkStatusReport>, ApiError>;
}
