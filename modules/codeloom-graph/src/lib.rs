//! Neo4j access layer: connection handling, schema migration, and the
//! batched, idempotent write operations the ingestion worker runs.

pub mod bolt;
pub mod client;
pub mod migrate;
#[cfg(feature = "test-utils")]
pub mod testutil;
pub mod writer;

pub use client::GraphClient;
pub use writer::{GraphWriter, WriteStats};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("graph store error: {0}")]
    Store(#[from] neo4rs::Error),

    #[error("row decoding error: {0}")]
    Decode(#[from] neo4rs::DeError),

    #[error("invalid relationship type: {0}")]
    InvalidRelationshipType(String),
}

/// Re-export for downstream crates that need raw Cypher access (e.g. the
/// query proxy and test assertions).
pub use neo4rs::query;
