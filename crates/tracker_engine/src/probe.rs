use std::sync::Arc;

use futures_util::future::join_all;
use tracker_core::{Availability, FileHandle, StageKind};
use tracker_logging::{tracker_debug, tracker_warn};

use crate::StageApi;

/// Items requested by an existence probe.
pub const PROBE_LIMIT: u32 = 1;

/// Cheap existence checks against the stage-content endpoint. Never retries;
/// the poller's next tick is the retry.
#[derive(Clone)]
pub struct StageProbe {
    api: Arc<dyn StageApi>,
}

impl StageProbe {
    pub fn new(api: Arc<dyn StageApi>) -> Self {
        Self { api }
    }

    pub async fn probe(&self, file: &FileHandle, stage: StageKind) -> Availability {
        match self.api.stage_content(file, stage, PROBE_LIMIT, 0).await {
            Ok(data) => {
                let summary = data.summary();
                if summary.has_output() {
                    Availability::Available(summary)
                } else {
                    tracker_debug!("probe {file}/{stage}: empty");
                    Availability::Unavailable
                }
            }
            Err(err) if err.is_not_found() => {
                tracker_debug!("probe {file}/{stage}: not generated ({})", err.message);
                Availability::Unavailable
            }
            Err(err) => {
                tracker_warn!("probe {file}/{stage} failed, availability unknown: {err}");
                Availability::Unknown {
                    reason: err.to_string(),
                }
            }
        }
    }

    /// Probes every stage of `file` concurrently, in [`StageKind::ALL`] order.
    pub async fn probe_all(&self, file: &FileHandle) -> Vec<(StageKind, Availability)> {
        let probes = StageKind::ALL
            .into_iter()
            .map(|stage| async move { (stage, self.probe(file, stage).await) });
        join_all(probes).await
    }
}
