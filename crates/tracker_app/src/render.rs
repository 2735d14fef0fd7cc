//! Plain-text rendering of availability, display states and chunk grids.

use tracker_core::{
    Availability, ChunkCell, ChunkCounts, ChunkStatus, DisplayState, SessionSnapshot, StageKind,
};

/// Cells per grid row.
pub const GRID_WIDTH: usize = 40;

pub fn availability_line(stage: StageKind, availability: &Availability) -> String {
    let detail = match availability {
        Availability::Available(summary) => format!("available ({summary})"),
        Availability::Unavailable => "not generated".to_string(),
        Availability::Unknown { reason } => format!("unknown ({reason})"),
    };
    format!("{:<8} {}", stage.as_str(), detail)
}

pub fn display_line(stage: StageKind, display: &DisplayState) -> String {
    let detail = match display {
        DisplayState::NeverGenerated => "not generated".to_string(),
        DisplayState::Generating {
            progress_percent,
            next_job_id,
        } => {
            let mut text = String::from("generating");
            if let Some(percent) = progress_percent {
                text.push_str(&format!(" {percent}%"));
            }
            if let Some(next) = next_job_id {
                text.push_str(&format!(" (next job {next})"));
            }
            text
        }
        DisplayState::Completed(summary) => format!("ready: {summary}"),
        DisplayState::Failed(message) => format!("failed: {message}"),
        DisplayState::TimedOut => "timed out waiting for result".to_string(),
    };
    format!("{:<8} {}", stage.as_str(), detail)
}

fn glyph(status: ChunkStatus) -> char {
    match status {
        ChunkStatus::Completed => '#',
        ChunkStatus::FailedRetryable => '!',
        ChunkStatus::FailedPermanent => 'x',
        ChunkStatus::Pending => '.',
    }
}

/// Rows of at most [`GRID_WIDTH`] glyphs, in chunk index order.
pub fn chunk_grid(cells: &[ChunkCell]) -> Vec<String> {
    cells
        .chunks(GRID_WIDTH)
        .map(|row| row.iter().map(|cell| glyph(cell.status)).collect())
        .collect()
}

pub fn chunk_counts_line(counts: &ChunkCounts) -> String {
    format!(
        "chunks: {} done, {} retrying, {} failed, {} pending",
        counts.completed, counts.failed_retryable, counts.failed_permanent, counts.pending
    )
}

/// Chunk section of a snapshot; empty when no chunk total is known.
pub fn chunk_lines(snapshot: &SessionSnapshot) -> Vec<String> {
    let Some(counts) = snapshot.chunk_counts() else {
        return Vec::new();
    };
    let mut lines = vec![chunk_counts_line(&counts)];
    lines.extend(chunk_grid(&snapshot.chunk_grid()));
    lines
}
