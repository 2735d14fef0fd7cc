use tokio::sync::mpsc;
use tracker_logging::tracker_info;

use crate::TrackerEvent;

/// Receives session events. Called with no tracker or snapshot lock held,
/// so implementations may read snapshots.
pub trait TrackerSink: Send + Sync {
    fn emit(&self, event: TrackerEvent);
}

/// Forwards events into an unbounded channel; dropped receivers are ignored.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<TrackerEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<TrackerEvent>) -> Self {
        Self { tx }
    }
}

impl TrackerSink for ChannelSink {
    fn emit(&self, event: TrackerEvent) {
        let _ = self.tx.send(event);
    }
}

/// Writes events to the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl TrackerSink for LogSink {
    fn emit(&self, event: TrackerEvent) {
        match event {
            TrackerEvent::DisplayChanged {
                file,
                stage,
                display,
            } => tracker_info!("{file}/{stage}: {display:?}"),
            TrackerEvent::DataReady {
                file,
                stage,
                summary,
            } => tracker_info!("{file}/{stage}: data ready ({summary})"),
            TrackerEvent::Cancelled { file, stage } => {
                tracker_info!("{file}/{stage}: tracking cancelled")
            }
        }
    }
}
