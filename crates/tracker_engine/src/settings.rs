use std::time::Duration;

use tracker_logging::tracker_warn;

pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const MAX_POLL_INTERVAL: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000/api/".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSettings {
    /// Cadence of poll ticks; constant for the lifetime of a session.
    pub interval: Duration,
    /// Ceiling after which a session reports `TimedOut`.
    pub timeout: Duration,
    /// Page size requested by the final full-data fetch.
    pub full_fetch_limit: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: MAX_POLL_INTERVAL,
            timeout: Duration::from_secs(5 * 60),
            full_fetch_limit: 1000,
        }
    }
}

impl PollSettings {
    /// Clamps the interval into the supported cadence range.
    pub fn normalized(mut self) -> Self {
        let clamped = self.interval.clamp(MIN_POLL_INTERVAL, MAX_POLL_INTERVAL);
        if clamped != self.interval {
            tracker_warn!(
                "poll interval {:?} outside {:?}..={:?}; using {:?}",
                self.interval,
                MIN_POLL_INTERVAL,
                MAX_POLL_INTERVAL,
                clamped
            );
            self.interval = clamped;
        }
        if self.full_fetch_limit == 0 {
            self.full_fetch_limit = 1;
        }
        self
    }
}
