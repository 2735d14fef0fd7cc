//! Backend payload shapes and their normalization into the core types.
//!
//! Backend versions disagree on field names (`_from`/`from`/`source`,
//! camelCase vs snake_case, bare counts vs lists). Every variant is accepted
//! here so nothing past this module sees the raw shapes.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Number, Value};
use tracker_core::{
    normalize_percent, ChunkDetail, ChunkStatusReport, GraphEntity, GraphRelation,
    ProcessingStatus, RunStatus, StageData, StageKind, StageProgress,
};

use crate::{ApiError, ApiErrorKind, RegenerateAck};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CountOrList {
    Count(u64),
    List(Vec<Value>),
}

impl CountOrList {
    fn count(&self) -> u64 {
        match self {
            CountOrList::Count(count) => *count,
            CountOrList::List(items) => items.len() as u64,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IdValue {
    Text(String),
    Number(i64),
}

impl IdValue {
    fn into_string(self) -> String {
        match self {
            IdValue::Text(text) => text,
            IdValue::Number(number) => number.to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawStorage {
    content: Option<String>,
    text: Option<String>,
    chunks: Option<CountOrList>,
    chunk_count: Option<u64>,
    total: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawVector {
    vectors: Option<CountOrList>,
    items: Option<CountOrList>,
    vector_count: Option<u64>,
    total: Option<u64>,
    count: Option<u64>,
    dimensions: Option<u32>,
    dim: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawGraph {
    entities: Option<Vec<RawEntityItem>>,
    nodes: Option<Vec<RawEntityItem>>,
    relations: Option<Vec<RawRelation>>,
    edges: Option<Vec<RawRelation>>,
    triples: Option<CountOrList>,
    triple_count: Option<u64>,
    #[serde(alias = "total_entities")]
    entity_count: Option<u64>,
    #[serde(alias = "total_relations")]
    relation_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawEntityItem {
    Name(String),
    Object(RawEntity),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawEntity {
    id: Option<IdValue>,
    #[serde(rename = "_id")]
    underscore_id: Option<IdValue>,
    name: Option<String>,
    label: Option<String>,
    #[serde(rename = "type")]
    type_name: Option<String>,
    entity_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawRelation {
    source: Option<IdValue>,
    from: Option<IdValue>,
    #[serde(rename = "_from")]
    underscore_from: Option<IdValue>,
    target: Option<IdValue>,
    to: Option<IdValue>,
    #[serde(rename = "_to")]
    underscore_to: Option<IdValue>,
    label: Option<String>,
    relation: Option<String>,
    predicate: Option<String>,
    #[serde(rename = "type")]
    type_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawProcessingStatus {
    #[serde(alias = "minio")]
    storage: Option<RawStageProgress>,
    vector: Option<RawStageProgress>,
    graph: Option<RawStageProgress>,
    #[serde(alias = "nextJobId")]
    next_job_id: Option<IdValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawStageProgress {
    status: Option<String>,
    progress: Option<Number>,
    message: Option<String>,
    error: Option<String>,
    #[serde(alias = "totalChunks")]
    total_chunks: Option<u32>,
    #[serde(alias = "completedChunks")]
    completed_chunks: Option<Vec<u32>>,
    #[serde(alias = "failedChunks")]
    failed_chunks: Option<Vec<u32>>,
    #[serde(alias = "failedPermanentChunks")]
    failed_permanent_chunks: Option<Vec<u32>>,
    #[serde(alias = "nextJobId")]
    next_job_id: Option<IdValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawChunkStatus {
    #[serde(alias = "totalChunks")]
    total_chunks: Option<u32>,
    #[serde(alias = "completedChunks")]
    completed_chunks: Option<Vec<u32>>,
    #[serde(alias = "failedChunks")]
    failed_chunks: Option<Vec<u32>>,
    #[serde(alias = "failedPermanentChunks")]
    failed_permanent_chunks: Option<Vec<u32>>,
    chunks: Option<BTreeMap<u32, RawChunkDetail>>,
    errors: Option<BTreeMap<u32, RawChunkError>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawChunkDetail {
    triples: Option<CountOrList>,
    attempts: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawChunkError {
    Text(String),
    Detail {
        error: Option<String>,
        message: Option<String>,
    },
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawRegenerateAck {
    #[serde(alias = "jobId")]
    job_id: Option<IdValue>,
    message: Option<String>,
}

fn decode_value(body: &[u8]) -> Result<Value, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Default::default()));
    }
    let value: Value = serde_json::from_slice(body)
        .map_err(|err| ApiError::new(ApiErrorKind::Decode, err.to_string()))?;
    if let Some(message) = not_found_message(&value) {
        return Err(ApiError::not_found(message));
    }
    Ok(unwrap_envelope(value))
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|err| ApiError::new(ApiErrorKind::Decode, err.to_string()))
}

/// `{"data": {...}}` envelopes are unwrapped when `data` is an object.
fn unwrap_envelope(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.get("data").is_some_and(Value::is_object) => {
            map.remove("data").unwrap_or_default()
        }
        other => other,
    }
}

/// Some backends answer 200 with an error body for missing resources.
fn not_found_message(value: &Value) -> Option<String> {
    let object = value.as_object()?;
    ["error", "detail"]
        .iter()
        .filter_map(|key| object.get(*key).and_then(Value::as_str))
        .find(|text| text.to_ascii_lowercase().contains("not found"))
        .map(str::to_string)
}

/// Extracts a human-readable message from an error response body.
pub(crate) fn error_message(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    let object = value.as_object()?;
    ["message", "detail", "error"]
        .iter()
        .filter_map(|key| object.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|text| !text.is_empty())
        .map(str::to_string)
}

pub(crate) fn parse_stage_content(stage: StageKind, body: &[u8]) -> Result<StageData, ApiError> {
    let value = decode_value(body)?;
    let data = match stage {
        StageKind::Storage => {
            let raw: RawStorage = decode(value)?;
            let text = raw.content.or(raw.text).unwrap_or_default();
            let chunk_count = raw
                .chunk_count
                .or(raw.total)
                .or_else(|| raw.chunks.as_ref().map(CountOrList::count))
                .unwrap_or(0);
            StageData::Storage { text, chunk_count }
        }
        StageKind::Vector => {
            let raw: RawVector = decode(value)?;
            let listed = raw
                .vectors
                .as_ref()
                .or(raw.items.as_ref())
                .map(CountOrList::count)
                .unwrap_or(0);
            StageData::Vector {
                vector_count: raw.vector_count.or(raw.total).or(raw.count).unwrap_or(listed),
                dimensions: raw.dimensions.or(raw.dim),
            }
        }
        StageKind::Graph => {
            let raw: RawGraph = decode(value)?;
            let entities = raw
                .entities
                .or(raw.nodes)
                .unwrap_or_default()
                .into_iter()
                .filter_map(normalize_entity)
                .collect();
            let relations = raw
                .relations
                .or(raw.edges)
                .unwrap_or_default()
                .into_iter()
                .filter_map(normalize_relation)
                .collect();
            StageData::Graph {
                entities,
                relations,
                triple_count: raw
                    .triple_count
                    .or_else(|| raw.triples.as_ref().map(CountOrList::count)),
                entity_total: raw.entity_count,
                relation_total: raw.relation_count,
            }
        }
    };
    Ok(data)
}

fn normalize_entity(item: RawEntityItem) -> Option<GraphEntity> {
    match item {
        RawEntityItem::Name(name) => Some(GraphEntity {
            id: name,
            label: None,
            kind: None,
        }),
        RawEntityItem::Object(raw) => {
            let id = raw
                .id
                .or(raw.underscore_id)
                .map(IdValue::into_string)
                .or_else(|| raw.name.clone())?;
            Some(GraphEntity {
                id,
                label: raw.label.or(raw.name),
                kind: raw.type_name.or(raw.entity_type),
            })
        }
    }
}

fn normalize_relation(raw: RawRelation) -> Option<GraphRelation> {
    let source = raw.source.or(raw.from).or(raw.underscore_from)?;
    let target = raw.target.or(raw.to).or(raw.underscore_to)?;
    Some(GraphRelation {
        source: source.into_string(),
        target: target.into_string(),
        label: raw
            .label
            .or(raw.relation)
            .or(raw.predicate)
            .or(raw.type_name),
    })
}

pub(crate) fn parse_regenerate_ack(body: &[u8]) -> Result<RegenerateAck, ApiError> {
    let raw: RawRegenerateAck = decode(decode_value(body)?)?;
    Ok(RegenerateAck {
        job_id: raw.job_id.map(IdValue::into_string),
        message: raw.message.unwrap_or_default(),
    })
}

pub(crate) fn parse_processing_status(body: &[u8]) -> Result<ProcessingStatus, ApiError> {
    let raw: RawProcessingStatus = decode(decode_value(body)?)?;
    let top_level_next = raw.next_job_id.map(IdValue::into_string);

    let graph_chunks = raw.graph.as_ref().and_then(|graph| {
        let report = chunk_report(
            graph.total_chunks,
            graph.completed_chunks.clone(),
            graph.failed_chunks.clone(),
            graph.failed_permanent_chunks.clone(),
        );
        (!report.is_empty()).then_some(report)
    });

    let mut graph = raw.graph.map(normalize_progress);
    if let Some(graph) = graph.as_mut() {
        if graph.next_job_id.is_none() {
            graph.next_job_id = top_level_next;
        }
    }

    Ok(ProcessingStatus {
        storage: raw.storage.map(normalize_progress),
        vector: raw.vector.map(normalize_progress),
        graph,
        graph_chunks,
    })
}

fn normalize_progress(raw: RawStageProgress) -> StageProgress {
    let percent = raw.progress.as_ref().and_then(progress_percent);
    let status = RunStatus::parse(raw.status.as_deref().unwrap_or(""), percent.is_some());
    StageProgress {
        status,
        percent,
        message: raw.message.or(raw.error),
        next_job_id: raw.next_job_id.map(IdValue::into_string),
    }
}

/// Floats up to 1.0 are fractions, so a finished fractional backend reads as
/// 100% rather than 1%. Integers are always percentages.
fn progress_percent(raw: &Number) -> Option<u8> {
    let value = raw.as_f64()?;
    normalize_percent(value, raw.is_f64() && value <= 1.0)
}

fn chunk_report(
    total: Option<u32>,
    completed: Option<Vec<u32>>,
    failed: Option<Vec<u32>>,
    failed_permanent: Option<Vec<u32>>,
) -> ChunkStatusReport {
    ChunkStatusReport {
        total_chunks: total,
        completed: completed.unwrap_or_default().into_iter().collect(),
        failed: failed.unwrap_or_default().into_iter().collect(),
        failed_permanent: failed_permanent.unwrap_or_default().into_iter().collect(),
        ..ChunkStatusReport::default()
    }
}

pub(crate) fn parse_chunk_status(body: &[u8]) -> Result<Option<ChunkStatusReport>, ApiError> {
    let value = match decode_value(body) {
        Ok(value) => value,
        Err(err) if err.is_not_found() => return Ok(None),
        Err(err) => return Err(err),
    };
    if value.is_null() {
        return Ok(None);
    }
    let raw: RawChunkStatus = decode(value)?;
    let mut report = chunk_report(
        raw.total_chunks,
        raw.completed_chunks,
        raw.failed_chunks,
        raw.failed_permanent_chunks,
    );
    report.details = raw
        .chunks
        .unwrap_or_default()
        .into_iter()
        .map(|(index, detail)| {
            (
                index,
                ChunkDetail {
                    triples: detail
                        .triples
                        .as_ref()
                        .map(|t| u32::try_from(t.count()).unwrap_or(u32::MAX)),
                    attempts: detail.attempts,
                },
            )
        })
        .collect();
    report.errors = raw
        .errors
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(index, error)| {
            let message = match error {
                RawChunkError::Text(text) => Some(text),
                RawChunkError::Detail { error, message } => error.or(message),
            }?;
            Some((index, message))
        })
        .collect();

    Ok((!report.is_empty()).then_some(report))
}
