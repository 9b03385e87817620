//! Closed vocabularies shared across the pipeline.
//!
//! Relationship types are the only strings ever interpolated into Cypher,
//! so anything reaching the graph layer must round-trip through
//! [`RelationshipType`] first.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Label applied to synthetic nodes standing in for targets no analyzer
/// will ever produce (stdlib calls, builtin types).
pub const EXTERNAL_LABEL: &str = "External";

/// Label of the materialized placeholder for an edge whose target node
/// does not exist yet.
pub const PENDING_LABEL: &str = "PendingRelationship";

/// The canonical relationship vocabulary accepted by ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipType {
    Contains,
    Calls,
    Imports,
    References,
    InheritsFrom,
    Implements,
    HasParameter,
    Returns,
    TypeArgument,
    CallsApi,
    Queries,
    QueriesTable,
    ModifiesTable,
    ReadsTable,
    UsesColumn,
    UsesEnvironmentVariable,
    UsesType,
    RelatedTo,
}

impl RelationshipType {
    /// All members, in declaration order. Used by the ingestion worker to
    /// validate types read back from pending rows.
    pub const ALL: [RelationshipType; 18] = [
        RelationshipType::Contains,
        RelationshipType::Calls,
        RelationshipType::Imports,
        RelationshipType::References,
        RelationshipType::InheritsFrom,
        RelationshipType::Implements,
        RelationshipType::HasParameter,
        RelationshipType::Returns,
        RelationshipType::TypeArgument,
        RelationshipType::CallsApi,
        RelationshipType::Queries,
        RelationshipType::QueriesTable,
        RelationshipType::ModifiesTable,
        RelationshipType::ReadsTable,
        RelationshipType::UsesColumn,
        RelationshipType::UsesEnvironmentVariable,
        RelationshipType::UsesType,
        RelationshipType::RelatedTo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::Contains => "CONTAINS",
            RelationshipType::Calls => "CALLS",
            RelationshipType::Imports => "IMPORTS",
            RelationshipType::References => "REFERENCES",
            RelationshipType::InheritsFrom => "INHERITS_FROM",
            RelationshipType::Implements => "IMPLEMENTS",
            RelationshipType::HasParameter => "HAS_PARAMETER",
            RelationshipType::Returns => "RETURNS",
            RelationshipType::TypeArgument => "TYPE_ARGUMENT",
            RelationshipType::CallsApi => "CALLS_API",
            RelationshipType::Queries => "QUERIES",
            RelationshipType::QueriesTable => "QUERIES_TABLE",
            RelationshipType::ModifiesTable => "MODIFIES_TABLE",
            RelationshipType::ReadsTable => "READS_TABLE",
            RelationshipType::UsesColumn => "USES_COLUMN",
            RelationshipType::UsesEnvironmentVariable => "USES_ENVIRONMENT_VARIABLE",
            RelationshipType::UsesType => "USES_TYPE",
            RelationshipType::RelatedTo => "RELATED_TO",
        }
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationshipType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RelationshipType::ALL
            .iter()
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown relationship type: {s}"))
    }
}

/// Node labels whose canonical_id identifies a definition site. The
/// resolver builds its definition registry from these.
const DEFINITION_LABELS: [&str; 13] = [
    "Function",
    "Class",
    "Method",
    "Interface",
    "Enum",
    "Struct",
    "Table",
    "Column",
    "ApiEndpoint",
    "EnvironmentVariable",
    "File",
    "Module",
    "Variable",
];

pub fn is_definition_label(label: &str) -> bool {
    DEFINITION_LABELS.contains(&label)
}
