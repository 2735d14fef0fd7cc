use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Opaque identifier of a user file, supplied by the surrounding application.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileHandle(String);

impl FileHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FileHandle {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for FileHandle {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Backend pipeline stages. Storage feeds both Vector and Graph, which run
/// independently of each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StageKind {
    Storage,
    Vector,
    Graph,
}

impl StageKind {
    pub const ALL: [StageKind; 3] = [StageKind::Storage, StageKind::Vector, StageKind::Graph];

    pub fn as_str(self) -> &'static str {
        match self {
            StageKind::Storage => "storage",
            StageKind::Vector => "vector",
            StageKind::Graph => "graph",
        }
    }

    /// The stage whose output this stage consumes.
    pub fn upstream(self) -> Option<StageKind> {
        match self {
            StageKind::Storage => None,
            StageKind::Vector | StageKind::Graph => Some(StageKind::Storage),
        }
    }

    /// Only graph extraction reports per-chunk progress.
    pub fn reports_chunks(self) -> bool {
        matches!(self, StageKind::Graph)
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown stage `{0}` (expected storage, vector or graph)")]
pub struct UnknownStage(pub String);

impl FromStr for StageKind {
    type Err = UnknownStage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "storage" | "minio" | "file" => Ok(StageKind::Storage),
            "vector" | "vectors" | "embedding" => Ok(StageKind::Vector),
            "graph" | "knowledge_graph" | "kg" => Ok(StageKind::Graph),
            _ => Err(UnknownStage(s.to_string())),
        }
    }
}

/// Stage-specific counts describing how much output a stage has produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageSummary {
    Storage { chunk_count: u64, content_bytes: u64 },
    Vector { vector_count: u64 },
    Graph {
        entity_count: u64,
        relation_count: u64,
        triple_count: u64,
    },
}

impl StageSummary {
    pub fn empty(stage: StageKind) -> Self {
        match stage {
            StageKind::Storage => StageSummary::Storage {
                chunk_count: 0,
                content_bytes: 0,
            },
            StageKind::Vector => StageSummary::Vector { vector_count: 0 },
            StageKind::Graph => StageSummary::Graph {
                entity_count: 0,
                relation_count: 0,
                triple_count: 0,
            },
        }
    }

    pub fn stage(&self) -> StageKind {
        match self {
            StageSummary::Storage { .. } => StageKind::Storage,
            StageSummary::Vector { .. } => StageKind::Vector,
            StageSummary::Graph { .. } => StageKind::Graph,
        }
    }

    /// Non-empty content or any non-zero count means the stage is usable.
    pub fn has_output(&self) -> bool {
        match *self {
            StageSummary::Storage {
                chunk_count,
                content_bytes,
            } => chunk_count > 0 || content_bytes > 0,
            StageSummary::Vector { vector_count } => vector_count > 0,
            StageSummary::Graph {
                entity_count,
                relation_count,
                triple_count,
            } => entity_count > 0 || relation_count > 0 || triple_count > 0,
        }
    }
}

impl fmt::Display for StageSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageSummary::Storage {
                chunk_count,
                content_bytes,
            } => write!(f, "{content_bytes} bytes in {chunk_count} chunks"),
            StageSummary::Vector { vector_count } => write!(f, "{vector_count} vectors"),
            StageSummary::Graph {
                entity_count,
                relation_count,
                triple_count,
            } => write!(
                f,
                "{entity_count} entities, {relation_count} relations, {triple_count} triples"
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphEntity {
    pub id: String,
    pub label: Option<String>,
    pub kind: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphRelation {
    pub source: String,
    pub target: String,
    pub label: Option<String>,
}

/// Canonical stage content after normalization of the backend payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageData {
    Storage {
        text: String,
        chunk_count: u64,
    },
    Vector {
        vector_count: u64,
        dimensions: Option<u32>,
    },
    Graph {
        entities: Vec<GraphEntity>,
        relations: Vec<GraphRelation>,
        /// Explicit triple count when the backend reports one.
        triple_count: Option<u64>,
        /// Totals reported by the backend; these exceed the list lengths on
        /// paged responses.
        entity_total: Option<u64>,
        relation_total: Option<u64>,
    },
}

impl StageData {
    pub fn stage(&self) -> StageKind {
        match self {
            StageData::Storage { .. } => StageKind::Storage,
            StageData::Vector { .. } => StageKind::Vector,
            StageData::Graph { .. } => StageKind::Graph,
        }
    }

    pub fn summary(&self) -> StageSummary {
        match self {
            StageData::Storage { text, chunk_count } => StageSummary::Storage {
                chunk_count: *chunk_count,
                content_bytes: text.len() as u64,
            },
            StageData::Vector { vector_count, .. } => StageSummary::Vector {
                vector_count: *vector_count,
            },
            StageData::Graph {
                entities,
                relations,
                triple_count,
                entity_total,
                relation_total,
            } => {
                let relation_count = relation_total
                    .unwrap_or(0)
                    .max(relations.len() as u64);
                StageSummary::Graph {
                    entity_count: entity_total.unwrap_or(0).max(entities.len() as u64),
                    relation_count,
                    triple_count: triple_count.unwrap_or(relation_count),
                }
            }
        }
    }

    pub fn is_available(&self) -> bool {
        self.summary().has_output()
    }
}

/// Outcome of an existence probe for one (file, stage) pair.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Availability {
    Available(StageSummary),
    /// The backend has no output for the stage (never generated or empty).
    #[default]
    Unavailable,
    /// The probe failed for a reason other than not-found. Displayed like
    /// `Unavailable` but kept distinct for diagnostics.
    Unknown { reason: String },
}

impl Availability {
    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available(_))
    }

    pub fn summary(&self) -> Option<&StageSummary> {
        match self {
            Availability::Available(summary) => Some(summary),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_names_round_trip_through_from_str() {
        for stage in StageKind::ALL {
            assert_eq!(stage.as_str().parse::<StageKind>(), Ok(stage));
        }
        assert_eq!("KG".parse::<StageKind>(), Ok(StageKind::Graph));
        assert!("pdf".parse::<StageKind>().is_err());
    }

    #[test]
    fn graph_summary_prefers_reported_totals() {
        let data = StageData::Graph {
            entities: vec![GraphEntity {
                id: "e1".into(),
                label: None,
                kind: None,
            }],
            relations: Vec::new(),
            triple_count: None,
            entity_total: Some(40),
            relation_total: Some(12),
        };
        assert_eq!(
            data.summary(),
            StageSummary::Graph {
                entity_count: 40,
                relation_count: 12,
                triple_count: 12,
            }
        );
        assert!(data.is_available());
    }

    #[test]
    fn empty_storage_is_not_available() {
        let data = StageData::Storage {
            text: String::new(),
            chunk_count: 0,
        };
        assert!(!data.is_available());
        assert_eq!(data.summary(), StageSummary::empty(StageKind::Storage));
    }
}
