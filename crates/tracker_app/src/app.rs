//! Command runners for the `stage-tracker` binary.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, watch};
use tracker_core::{DisplayState, FileHandle, PollerState, SessionSnapshot, StageKind};
use tracker_engine::{
    ChannelSink, LogSink, ReqwestStageApi, Tracker, TrackerEvent, TrackerSink,
};
use tracker_logging::{tracker_debug, tracker_info};

use crate::config::TrackerConfig;
use crate::render;

pub struct App {
    tracker: Tracker,
    events: mpsc::UnboundedReceiver<TrackerEvent>,
}

impl App {
    pub fn new(config: &TrackerConfig) -> Result<Self> {
        let api = ReqwestStageApi::new(config.client_settings())
            .with_context(|| format!("invalid backend url {:?}", config.base_url))?;
        tracker_debug!("backend at {}", api.base_url());
        let (tx, events) = mpsc::unbounded_channel();
        let tracker = Tracker::new(
            Arc::new(api),
            config.poll_settings(),
            Arc::new(ChannelSink::new(tx)),
        );
        Ok(Self { tracker, events })
    }

    /// Probes every stage once and prints one line per stage.
    pub async fn status(&self, file: &FileHandle) -> Result<()> {
        println!("{file}");
        for (stage, availability) in self.tracker.probe_all(file).await {
            println!("  {}", render::availability_line(stage, &availability));
        }
        Ok(())
    }

    /// Follows a pair until its stage appears or polling ends.
    pub async fn watch(&mut self, file: &FileHandle, stage: StageKind) -> Result<DisplayState> {
        let rx = self.tracker.start_tracking(file, stage);
        self.follow(file, stage, rx).await
    }

    /// Submits a regeneration, then follows the new job.
    pub async fn regenerate(
        &mut self,
        file: &FileHandle,
        stage: StageKind,
    ) -> Result<DisplayState> {
        let job = self.tracker.regenerate(file, stage).await?;
        println!("submitted {stage} regeneration for {file} (job {})", job.label());
        let rx = self
            .tracker
            .subscribe(file, stage)
            .context("regeneration session was not registered")?;
        self.follow(file, stage, rx).await
    }

    async fn follow(
        &mut self,
        file: &FileHandle,
        stage: StageKind,
        mut rx: watch::Receiver<SessionSnapshot>,
    ) -> Result<DisplayState> {
        let initial = rx.borrow_and_update().clone();
        println!("{}", render::display_line(stage, &initial.display));
        let mut shown_chunks = print_new(Vec::new(), render::chunk_lines(&initial));
        if settled(&initial) {
            return Ok(initial.display);
        }

        let interrupt = tokio::signal::ctrl_c();
        tokio::pin!(interrupt);
        loop {
            tokio::select! {
                _ = &mut interrupt => {
                    tracker_info!("interrupted, stopping {file}/{stage}");
                    self.tracker.stop_tracking(file, stage);
                    break;
                }
                Some(event) = self.events.recv() => print_event(&event),
                changed = rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = rx.borrow_and_update().clone();
                    shown_chunks = print_new(shown_chunks, render::chunk_lines(&snapshot));
                    if settled(&snapshot) {
                        break;
                    }
                }
            }
        }

        while let Ok(event) = self.events.try_recv() {
            print_event(&event);
        }
        let last = rx.borrow().display.clone();
        Ok(last)
    }
}

/// A session is settled once polling ended and, after convergence, the
/// full-data fetch has answered.
fn settled(snapshot: &SessionSnapshot) -> bool {
    match snapshot.poller_state {
        PollerState::Converged => snapshot.data.is_some() || snapshot.full_data_error.is_some(),
        state => state.is_terminal(),
    }
}

fn print_new(shown: Vec<String>, lines: Vec<String>) -> Vec<String> {
    if lines != shown {
        for line in &lines {
            println!("  {line}");
        }
    }
    lines
}

fn print_event(event: &TrackerEvent) {
    match event {
        TrackerEvent::DisplayChanged { stage, display, .. } => {
            println!("{}", render::display_line(*stage, display));
        }
        TrackerEvent::DataReady { stage, summary, .. } => {
            println!("{:<8} fetched {summary}", stage.as_str());
        }
        TrackerEvent::Cancelled { .. } => LogSink.emit(event.clone()),
    }
}
