#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;
use tracker_core::{
    ChunkStatusReport, FileHandle, GraphEntity, ProcessingStatus, RunStatus, StageData, StageKind,
    StageProgress,
};
use tracker_engine::{
    ApiError, RegenerateAck, StageApi, TrackerEvent, TrackerSink, PROBE_LIMIT,
};

pub fn init_logging() {
    tracker_logging::initialize_for_tests();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Probe(StageKind),
    FullFetch(StageKind),
    Regenerate(StageKind),
    Status,
    Chunks,
}

/// Responses served in order; the fallback repeats once the steps run out.
struct Script<T> {
    steps: VecDeque<(Duration, T)>,
    fallback: (Duration, T),
}

impl<T: Clone> Script<T> {
    fn new(fallback: T) -> Self {
        Self {
            steps: VecDeque::new(),
            fallback: (Duration::ZERO, fallback),
        }
    }

    fn next(&mut self) -> (Duration, T) {
        self.steps
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

/// Scripted in-memory backend recording every call.
pub struct FakeStageApi {
    calls: Mutex<Vec<(Instant, Call)>>,
    probes: Mutex<Script<Result<StageData, ApiError>>>,
    full: Mutex<Result<StageData, ApiError>>,
    status: Mutex<Script<Result<ProcessingStatus, ApiError>>>,
    chunks: Mutex<Script<Result<Option<ChunkStatusReport>, ApiError>>>,
    regenerate: Mutex<Script<Result<RegenerateAck, ApiError>>>,
}

impl Default for FakeStageApi {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeStageApi {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            probes: Mutex::new(Script::new(Err(ApiError::not_found("no such stage")))),
            full: Mutex::new(Err(ApiError::not_found("no such stage"))),
            status: Mutex::new(Script::new(Ok(ProcessingStatus::default()))),
            chunks: Mutex::new(Script::new(Ok(None))),
            regenerate: Mutex::new(Script::new(Ok(RegenerateAck {
                job_id: Some("job-1".into()),
                message: "queued".into(),
            }))),
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn push_probe(&self, result: Result<StageData, ApiError>) {
        self.probes
            .lock()
            .unwrap()
            .steps
            .push_back((Duration::ZERO, result));
    }

    pub fn set_probe_fallback(&self, result: Result<StageData, ApiError>) {
        self.probes.lock().unwrap().fallback = (Duration::ZERO, result);
    }

    pub fn set_full_data(&self, result: Result<StageData, ApiError>) {
        *self.full.lock().unwrap() = result;
    }

    pub fn push_status(&self, delay: Duration, result: Result<ProcessingStatus, ApiError>) {
        self.status.lock().unwrap().steps.push_back((delay, result));
    }

    pub fn set_status_fallback(&self, delay: Duration, result: Result<ProcessingStatus, ApiError>) {
        self.status.lock().unwrap().fallback = (delay, result);
    }

    pub fn set_chunks_fallback(&self, result: Result<Option<ChunkStatusReport>, ApiError>) {
        self.chunks.lock().unwrap().fallback = (Duration::ZERO, result);
    }

    pub fn set_regenerate(&self, delay: Duration, result: Result<RegenerateAck, ApiError>) {
        self.regenerate.lock().unwrap().fallback = (delay, result);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, call)| call.clone())
            .collect()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    /// Instants at which `call` was made, in order.
    pub fn times(&self, call: &Call) -> Vec<Instant> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, c)| c == call)
            .map(|(at, _)| *at)
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push((Instant::now(), call));
    }
}

async fn respond<T>(step: (Duration, T)) -> T {
    let (delay, value) = step;
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    value
}

#[async_trait::async_trait]
impl StageApi for FakeStageApi {
    async fn stage_content(
        &self,
        _file: &FileHandle,
        stage: StageKind,
        limit: u32,
        _offset: u32,
    ) -> Result<StageData, ApiError> {
        if limit != PROBE_LIMIT {
            self.record(Call::FullFetch(stage));
            let full = self.full.lock().unwrap().clone();
            return full;
        }
        self.record(Call::Probe(stage));
        let step = self.probes.lock().unwrap().next();
        respond(step).await
    }

    async fn regenerate(
        &self,
        _file: &FileHandle,
        stage: StageKind,
    ) -> Result<RegenerateAck, ApiError> {
        self.record(Call::Regenerate(stage));
        let step = self.regenerate.lock().unwrap().next();
        respond(step).await
    }

    async fn processing_status(&self, _file: &FileHandle) -> Result<ProcessingStatus, ApiError> {
        self.record(Call::Status);
        let step = self.status.lock().unwrap().next();
        respond(step).await
    }

    async fn chunk_status(
        &self,
        _file: &FileHandle,
    ) -> Result<Option<ChunkStatusReport>, ApiError> {
        self.record(Call::Chunks);
        let step = self.chunks.lock().unwrap().next();
        respond(step).await
    }
}

#[derive(Default)]
pub struct CollectingSink {
    events: Mutex<Vec<TrackerEvent>>,
}

impl CollectingSink {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<TrackerEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn cancellations(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, TrackerEvent::Cancelled { .. }))
            .count()
    }
}

impl TrackerSink for CollectingSink {
    fn emit(&self, event: TrackerEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub fn progress(stage: StageKind, status: RunStatus, percent: Option<u8>) -> ProcessingStatus {
    let progress = Some(StageProgress {
        status,
        percent,
        ..StageProgress::default()
    });
    let mut out = ProcessingStatus::default();
    match stage {
        StageKind::Storage => out.storage = progress,
        StageKind::Vector => out.vector = progress,
        StageKind::Graph => out.graph = progress,
    }
    out
}

pub fn graph_data(entities: usize) -> StageData {
    StageData::Graph {
        entities: (0..entities)
            .map(|i| GraphEntity {
                id: format!("e{i}"),
                label: None,
                kind: None,
            })
            .collect(),
        relations: Vec::new(),
        triple_count: None,
        entity_total: None,
        relation_total: None,
    }
}

pub fn vectors(count: u64) -> StageData {
    StageData::Vector {
        vector_count: count,
        dimensions: Some(384),
    }
}
