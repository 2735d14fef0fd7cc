//! Tracker engine: backend client, availability probes and the poll/regenerate runtime.
mod api;
mod http;
mod poller;
mod probe;
mod settings;
mod sink;
mod tracker;
mod types;
mod wire;

pub use api::StageApi;
pub use http::ReqwestStageApi;
pub use poller::{JobPoller, PollerHandle};
pub use probe::{StageProbe, PROBE_LIMIT};
pub use settings::{ClientSettings, PollSettings, MAX_POLL_INTERVAL, MIN_POLL_INTERVAL};
pub use sink::{ChannelSink, LogSink, TrackerSink};
pub use tracker::Tracker;
pub use types::{
    ApiError, ApiErrorKind, RegenerateAck, SessionKey, TrackerError, TrackerEvent,
};
