pub mod config;
pub mod error;
pub mod pathfilter;
pub mod types;
pub mod vocab;

pub use config::Config;
pub use error::ConfigError;
pub use pathfilter::PathFilter;
pub use types::{
    AnalysisJob, AnalyzerResult, EventType, GraphDelta, GraphRelationship, NodeStub, Properties,
    RelationshipRef, RelationshipStub, ScanRequest, SCAN_ACTION_FULL,
};
pub use vocab::{is_definition_label, RelationshipType, EXTERNAL_LABEL, PENDING_LABEL};
