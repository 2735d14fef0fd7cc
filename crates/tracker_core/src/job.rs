use chrono::{DateTime, Utc};

use crate::StageKind;

/// Label shown for a job the backend accepted without returning an id.
pub const PENDING_JOB_LABEL: &str = "pending";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Submitted,
    Polling,
    Converged,
    TimedOut,
}

/// Client-side record of an accepted regenerate request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegenerationJob {
    /// Backend job id; `None` when the backend did not return one.
    pub job_id: Option<String>,
    pub stage: StageKind,
    pub submitted_at: DateTime<Utc>,
    pub status: JobStatus,
}

impl RegenerationJob {
    pub fn new(job_id: Option<String>, stage: StageKind, submitted_at: DateTime<Utc>) -> Self {
        let job_id = job_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty() && id != PENDING_JOB_LABEL);
        Self {
            job_id,
            stage,
            submitted_at,
            status: JobStatus::Submitted,
        }
    }

    pub fn label(&self) -> &str {
        self.job_id.as_deref().unwrap_or(PENDING_JOB_LABEL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_and_sentinel_ids_are_absent() {
        let now = Utc::now();
        assert_eq!(RegenerationJob::new(Some("  ".into()), StageKind::Graph, now).job_id, None);
        let job = RegenerationJob::new(Some("pending".into()), StageKind::Graph, now);
        assert_eq!(job.job_id, None);
        assert_eq!(job.label(), PENDING_JOB_LABEL);
        assert_eq!(job.status, JobStatus::Submitted);
    }

    #[test]
    fn real_id_is_kept() {
        let job = RegenerationJob::new(Some("job-42".into()), StageKind::Vector, Utc::now());
        assert_eq!(job.label(), "job-42");
    }
}
