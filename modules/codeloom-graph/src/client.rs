use neo4rs::{ConfigBuilder, Graph};

use crate::GraphError;

/// Thin wrapper around neo4rs::Graph providing connection setup.
#[derive(Clone)]
pub struct GraphClient {
    pub(crate) graph: Graph,
}

impl GraphClient {
    /// Connect to Neo4j with the given credentials.
    pub async fn connect(uri: &str, user: &str, password: &str) -> Result<Self, GraphError> {
        let config = ConfigBuilder::default()
            .uri(uri)
            .user(user)
            .password(password)
            .fetch_size(500)
            .max_connections(10)
            .build()?;
        let graph = Graph::connect(config).await?;
        Ok(Self { graph })
    }

    /// Get a reference to the underlying neo4rs Graph.
    pub fn inner(&self) -> &Graph {
        &self.graph
    }

    /// Run a read query and return every row as a JSON object. Used by the
    /// gateway's Cypher proxy, where the caller shapes the RETURN clause.
    pub async fn execute_json(
        &self,
        cypher: &str,
        params: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Vec<serde_json::Value>, GraphError> {
        let mut q = neo4rs::query(cypher);
        for (key, value) in params {
            q = q.param(key, crate::bolt::json_to_bolt(value));
        }
        let mut rows = Vec::new();
        let mut stream = self.graph.execute(q).await?;
        while let Some(row) = stream.next().await? {
            rows.push(row.to::<serde_json::Value>()?);
        }
        Ok(rows)
    }
}
