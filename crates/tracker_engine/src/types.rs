use std::fmt;

use thiserror::Error;
use tracker_core::{DisplayState, FileHandle, StageKind, StageSummary};

/// Identifies one tracked (file, stage) pair.
pub type SessionKey = (FileHandle, StageKind);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub message: String,
}

impl ApiError {
    pub(crate) fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::NotFound, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Network, message)
    }

    pub fn status(code: u16, message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::HttpStatus(code), message)
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ApiErrorKind::NotFound
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for ApiError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    InvalidUrl,
    NotFound,
    HttpStatus(u16),
    Timeout,
    Network,
    Decode,
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiErrorKind::InvalidUrl => write!(f, "invalid url"),
            ApiErrorKind::NotFound => write!(f, "not found"),
            ApiErrorKind::HttpStatus(code) => write!(f, "http status {code}"),
            ApiErrorKind::Timeout => write!(f, "timeout"),
            ApiErrorKind::Network => write!(f, "network error"),
            ApiErrorKind::Decode => write!(f, "malformed response"),
        }
    }
}

/// Errors surfaced synchronously to callers of `Tracker::regenerate`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackerError {
    #[error("regenerate {stage} rejected: {message}")]
    Submission { stage: StageKind, message: String },
    #[error("{stage} regeneration already running for {file}")]
    Conflict { file: FileHandle, stage: StageKind },
}

/// Backend acknowledgement of a regenerate request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RegenerateAck {
    pub job_id: Option<String>,
    pub message: String,
}

/// Notifications pushed to a [`crate::TrackerSink`] while sessions run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerEvent {
    DisplayChanged {
        file: FileHandle,
        stage: StageKind,
        display: DisplayState,
    },
    /// The final full-data fetch delivered content.
    DataReady {
        file: FileHandle,
        stage: StageKind,
        summary: StageSummary,
    },
    Cancelled {
        file: FileHandle,
        stage: StageKind,
    },
}
