//! Wire types carried over the work queues.
//!
//! Every message is JSON with `content-type: application/json` and
//! persistent delivery. Unknown fields are tolerated on deserialization so
//! mixed-version analyzers can coexist on the same broker.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Property bags on stubs are opaque string→scalar maps.
pub type Properties = serde_json::Map<String, serde_json::Value>;

pub const SCAN_ACTION_FULL: &str = "full_scan";

/// Filesystem change kind carried by an analysis job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Created,
    Modified,
    Deleted,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::Created => write!(f, "CREATED"),
            EventType::Modified => write!(f, "MODIFIED"),
            EventType::Deleted => write!(f, "DELETED"),
        }
    }
}

/// One per-file analysis job, published to a per-language queue by the
/// watcher or the bulk scanner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisJob {
    /// Repository-relative path, forward slashes.
    pub file_path: String,
    pub event_type: EventType,
    /// Set by the bulk scanner; watcher jobs may omit it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
}

/// Scan trigger message, published by the gateway and consumed by the
/// bulk scanner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRequest {
    pub action: String,
    pub root_path: String,
    #[serde(default)]
    pub wipe_existing: bool,
}

/// A node emitted by an analyzer, prior to ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeStub {
    /// Global id, the MERGE key in the graph store.
    pub gid: String,
    pub canonical_id: String,
    pub name: String,
    pub file_path: String,
    pub language: String,
    /// First label is the primary type.
    pub labels: Vec<String>,
    #[serde(default)]
    pub properties: Properties,
}

/// A relationship emitted by an analyzer. The source is always known
/// exactly; the target may not exist yet anywhere in the graph, which is
/// why it is addressed by canonical id rather than GID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipStub {
    pub source_gid: String,
    pub target_canonical_id: String,
    #[serde(rename = "type")]
    pub rel_type: String,
    #[serde(default)]
    pub properties: Properties,
}

/// Identifies a concrete or pending relationship for deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipRef {
    pub source_gid: String,
    pub target_canonical_id: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub rel_type: Option<String>,
}

/// Result of analyzing one file, published to the shared results queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerResult {
    pub file_path: String,
    pub language: String,
    /// Set when the file could not be parsed; node/edge lists are empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub nodes_upserted: Vec<NodeStub>,
    #[serde(default)]
    pub relationships_upserted: Vec<RelationshipStub>,
    /// GIDs of nodes to delete; deletion cascades through containment.
    #[serde(default)]
    pub nodes_deleted: Vec<String>,
    #[serde(default)]
    pub relationships_deleted: Vec<RelationshipRef>,
}

/// A relationship after resolver canonicalization: its type is validated
/// against the closed vocabulary and safe to interpolate into Cypher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphRelationship {
    pub source_gid: String,
    pub target_canonical_id: String,
    pub rel_type: crate::vocab::RelationshipType,
    #[serde(default)]
    pub properties: Properties,
}

/// Final graph delta produced by the resolver, ready for ingestion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphDelta {
    pub nodes: Vec<NodeStub>,
    pub relationships: Vec<GraphRelationship>,
    pub nodes_deleted: Vec<String>,
    pub relationships_deleted: Vec<RelationshipRef>,
}

impl AnalyzerResult {
    pub fn empty(file_path: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            language: language.into(),
            error: None,
            nodes_upserted: Vec::new(),
            relationships_upserted: Vec::new(),
            nodes_deleted: Vec::new(),
            relationships_deleted: Vec::new(),
        }
    }

    pub fn failed(
        file_path: impl Into<String>,
        language: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        let mut result = Self::empty(file_path, language);
        result.error = Some(error.into());
        result
    }
}
