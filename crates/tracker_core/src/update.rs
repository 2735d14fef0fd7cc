use crate::{
    Availability, ChunkStatusModel, Effect, JobStatus, Msg, PollReport, PollSession, PollerState,
    RunStatus, StopReason,
};

/// Pure update function: applies a message to a session and returns any effects.
pub fn update(mut session: PollSession, msg: Msg) -> (PollSession, Vec<Effect>) {
    let effects = match msg {
        Msg::Start { job } => {
            if session.state != PollerState::Idle {
                return (session, Vec::new());
            }
            session.state = PollerState::Running;
            if let Some(mut job) = job {
                job.status = JobStatus::Polling;
                session.awaiting_activity = true;
                session.job = Some(job);
            }
            session.mark_dirty();
            Vec::new()
        }
        Msg::Tick { elapsed } => {
            if session.state != PollerState::Running {
                return (session, Vec::new());
            }
            if elapsed >= session.timeout() {
                session.state = PollerState::TimedOut;
                if let Some(job) = session.job.as_mut() {
                    job.status = JobStatus::TimedOut;
                }
                session.mark_dirty();
                vec![Effect::StopTimer {
                    reason: StopReason::TimedOut,
                }]
            } else {
                session.issued_ticks += 1;
                vec![Effect::Poll {
                    tick: session.issued_ticks,
                }]
            }
        }
        Msg::PollResolved { tick, report } => {
            if session.state != PollerState::Running {
                return (session, Vec::new());
            }
            if tick <= session.last_applied_tick {
                session.stale_discarded += 1;
                session.mark_dirty();
                return (session, Vec::new());
            }
            session.last_applied_tick = tick;
            apply_report(&mut session, report)
        }
        Msg::FullDataFetched(result) => {
            if !session.awaiting_full_data {
                return (session, Vec::new());
            }
            session.awaiting_full_data = false;
            match result {
                Ok(data) => {
                    let summary = data.summary();
                    if summary.has_output() {
                        session.availability = Availability::Available(summary);
                    }
                    session.data = Some(data);
                }
                Err(message) => session.full_data_error = Some(message),
            }
            session.mark_dirty();
            Vec::new()
        }
        Msg::Cancel => {
            if session.state.is_terminal() {
                return (session, Vec::new());
            }
            session.state = PollerState::Cancelled;
            session.awaiting_full_data = false;
            session.mark_dirty();
            vec![Effect::StopTimer {
                reason: StopReason::Cancelled,
            }]
        }
        Msg::NoOp => Vec::new(),
    };

    (session, effects)
}

fn apply_report(session: &mut PollSession, report: PollReport) -> Vec<Effect> {
    let PollReport {
        availability,
        status,
        chunks,
    } = report;

    if session.availability != availability {
        session.availability = availability;
        session.mark_dirty();
    }

    let mut progress = status
        .as_ref()
        .and_then(|status| status.stage(session.stage()).cloned());
    if session.awaiting_activity {
        match progress.as_ref().map(|p| p.status) {
            Some(RunStatus::Queued | RunStatus::Processing) => session.awaiting_activity = false,
            // Until the new job is picked up, a failure belongs to an earlier run.
            Some(RunStatus::Failed) => progress = None,
            _ => {}
        }
    }
    if progress.is_some() && session.progress != progress {
        session.progress = progress;
        session.mark_dirty();
    }

    if session.stage().reports_chunks() {
        let chunk_report = chunks.or_else(|| status.and_then(|status| status.graph_chunks));
        if let Some(chunk_report) = chunk_report.filter(|r| !r.is_empty()) {
            let model = session.chunks.get_or_insert_with(ChunkStatusModel::new);
            let before = model.clone();
            let refused = model.merge(&chunk_report);
            session.refused_regressions += refused as u64;
            if *model != before {
                session.mark_dirty();
            }
        }
    }

    // Availability alone decides convergence; partial graphs are already queryable.
    if session.availability.is_available() {
        session.state = PollerState::Converged;
        session.awaiting_full_data = true;
        if let Some(job) = session.job.as_mut() {
            job.status = JobStatus::Converged;
        }
        session.mark_dirty();
        return vec![
            Effect::StopTimer {
                reason: StopReason::Converged,
            },
            Effect::FetchFullData,
        ];
    }

    let failed = session
        .progress
        .as_ref()
        .is_some_and(|progress| progress.status == RunStatus::Failed);
    if failed {
        session.state = PollerState::Failed;
        session.mark_dirty();
        return vec![Effect::StopTimer {
            reason: StopReason::Failed,
        }];
    }

    Vec::new()
}
