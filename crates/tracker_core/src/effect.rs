#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Probe availability and fetch progress, tagging the response with `tick`.
    Poll { tick: u64 },
    /// Fetch the complete stage content once.
    FetchFullData,
    /// Stop the poll timer.
    StopTimer { reason: StopReason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Converged,
    TimedOut,
    Failed,
    Cancelled,
}
