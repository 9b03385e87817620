use neo4rs::query;
use tracing::info;

use crate::{GraphClient, GraphError};

/// Labels that carry a stable canonical_id and get an index on it.
const INDEXED_LABELS: [&str; 10] = [
    "File", "Module", "Class", "Function", "Method", "Variable", "Table", "Column",
    "ApiEndpoint", "HtmlElement",
];

/// Run idempotent schema migrations: indexes on lookup properties.
/// Uniqueness of gid is enforced by it being the MERGE key everywhere.
pub async fn migrate(client: &GraphClient) -> Result<(), GraphError> {
    let g = &client.graph;

    info!("Running schema migrations...");

    for label in INDEXED_LABELS {
        let name = format!("canonical_id_{}", label.to_lowercase());
        let cypher = format!(
            "CREATE INDEX {name} IF NOT EXISTS FOR (n:{label}) ON (n.canonical_id)"
        );
        g.run(query(&cypher)).await?;
    }
    info!("canonical_id indexes created");

    // Signature-blind lookup for call targets predicted from imports.
    for label in ["Function", "Method"] {
        let name = format!("simple_canonical_id_{}", label.to_lowercase());
        let cypher = format!(
            "CREATE INDEX {name} IF NOT EXISTS FOR (n:{label}) ON (n.simple_canonical_id)"
        );
        g.run(query(&cypher)).await?;
    }

    // Pending placeholders are looked up from both ends on every upsert.
    let pending = [
        "CREATE INDEX pending_target IF NOT EXISTS FOR (n:PendingRelationship) ON (n.target_canonical_id)",
        "CREATE INDEX pending_source IF NOT EXISTS FOR (n:PendingRelationship) ON (n.source_gid)",
    ];
    for cypher in pending {
        g.run(query(cypher)).await?;
    }

    info!("Schema migration complete");
    Ok(())
}
