use std::collections::HashMap;
use std::str::FromStr;

use neo4rs::query;
use neo4rs::{BoltList, BoltMap, BoltType};
use tracing::{debug, info, warn};

use codeloom_common::{GraphRelationship, NodeStub, RelationshipRef, RelationshipType};

use crate::bolt::{object_to_bolt, properties_to_bolt, string_list};
use crate::{GraphClient, GraphError};

/// Write-side wrapper for the graph. Used by the ingestion worker only.
///
/// Every operation is idempotent: nodes MERGE on gid, relationships MERGE
/// on (source, type, target), pendings MERGE on their full identity. A
/// relationship whose endpoint is missing is converted into a
/// `PendingRelationship` placeholder in the same transaction, and every
/// node upsert opportunistically resolves pendings touching the new node.
pub struct GraphWriter {
    client: GraphClient,
}

/// Counters reported after applying one delta.
#[derive(Debug, Default, Clone, Copy)]
pub struct WriteStats {
    pub nodes_upserted: usize,
    pub relationships_written: usize,
    pub pendings_resolved: usize,
    pub nodes_deleted: usize,
}

/// One pending placeholder read back from the graph.
#[derive(Debug, Clone)]
struct PendingRow {
    source_gid: String,
    target_canonical_id: String,
    rel_type: String,
    properties_json: Option<String>,
}

impl GraphWriter {
    pub fn new(client: GraphClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &GraphClient {
        &self.client
    }

    /// Upsert nodes grouped by label set, then resolve any pendings that
    /// the new canonical ids satisfy.
    pub async fn upsert_nodes(&self, nodes: &[NodeStub]) -> Result<WriteStats, GraphError> {
        let mut stats = WriteStats::default();
        if nodes.is_empty() {
            return Ok(stats);
        }

        let mut label_groups: HashMap<Vec<String>, Vec<&NodeStub>> = HashMap::new();
        for node in nodes {
            let labels = sanitized_labels(&node.labels);
            label_groups.entry(labels).or_default().push(node);
        }

        let mut canonical_ids = Vec::with_capacity(nodes.len());
        for (labels, group) in label_groups {
            let label_str = labels.join("`:`");
            let cypher = format!(
                "UNWIND $batch AS row \
                 MERGE (n:`{label_str}` {{gid: row.gid}}) \
                 SET n += row.props \
                 SET n.canonical_id = row.canonical_id, n.name = row.name, \
                     n.file_path = row.file_path, n.language = row.language \
                 RETURN count(n) AS upserted"
            );

            let mut batch = BoltList::new();
            for node in &group {
                let mut row = BoltMap::new();
                row.put("gid".into(), BoltType::String(node.gid.as_str().into()));
                row.put(
                    "canonical_id".into(),
                    BoltType::String(node.canonical_id.as_str().into()),
                );
                row.put("name".into(), BoltType::String(node.name.as_str().into()));
                row.put(
                    "file_path".into(),
                    BoltType::String(node.file_path.as_str().into()),
                );
                row.put(
                    "language".into(),
                    BoltType::String(node.language.as_str().into()),
                );
                row.put("props".into(), BoltType::Map(properties_to_bolt(&node.properties)));
                batch.push(BoltType::Map(row));
                canonical_ids.push(node.canonical_id.clone());
            }

            let q = query(&cypher).param("batch", BoltType::List(batch));
            let mut stream = self.client.graph.execute(q).await?;
            if let Some(row) = stream.next().await? {
                let upserted: i64 = row.get("upserted")?;
                stats.nodes_upserted += upserted as usize;
            }
        }

        stats.pendings_resolved += self.resolve_pendings_for(&canonical_ids).await?;
        Ok(stats)
    }

    /// Upsert relationships grouped by type. Rows whose source or target
    /// cannot be matched become PendingRelationship placeholders; both
    /// steps run in one transaction per type group.
    pub async fn upsert_relationships(
        &self,
        relationships: &[GraphRelationship],
    ) -> Result<usize, GraphError> {
        if relationships.is_empty() {
            return Ok(0);
        }

        let mut type_groups: HashMap<RelationshipType, Vec<&GraphRelationship>> = HashMap::new();
        for rel in relationships {
            type_groups.entry(rel.rel_type).or_default().push(rel);
        }

        let mut written = 0usize;
        for (rel_type, group) in type_groups {
            let merge_cypher = format!(
                "UNWIND $batch AS row \
                 MATCH (source {{gid: row.source_gid}}) \
                 MATCH (target) \
                 WHERE target.canonical_id = row.target_canonical_id \
                    OR target.simple_canonical_id = row.target_canonical_id \
                 MERGE (source)-[r:`{}`]->(target) \
                 SET r += row.properties \
                 SET r.target_canonical_id = target.canonical_id",
                rel_type.as_str()
            );
            let pending_cypher = "UNWIND $batch AS row \
                 OPTIONAL MATCH (source {gid: row.source_gid}) \
                 OPTIONAL MATCH (target) \
                 WHERE target.canonical_id = row.target_canonical_id \
                    OR target.simple_canonical_id = row.target_canonical_id \
                 WITH row, source, target \
                 WHERE source IS NULL OR target IS NULL \
                 MERGE (pr:PendingRelationship {source_gid: row.source_gid, \
                        target_canonical_id: row.target_canonical_id, type: $rel_type}) \
                 ON CREATE SET pr.properties_json = row.properties_json";

            let mut batch = BoltList::new();
            for rel in &group {
                let mut row = BoltMap::new();
                row.put(
                    "source_gid".into(),
                    BoltType::String(rel.source_gid.as_str().into()),
                );
                row.put(
                    "target_canonical_id".into(),
                    BoltType::String(rel.target_canonical_id.as_str().into()),
                );
                row.put("properties".into(), BoltType::Map(properties_to_bolt(&rel.properties)));
                let rendered = serde_json::Value::Object(rel.properties.clone()).to_string();
                row.put("properties_json".into(), BoltType::String(rendered.into()));
                batch.push(BoltType::Map(row));
            }
            let batch = BoltType::List(batch);

            let mut txn = self.client.graph.start_txn().await?;
            txn.run(query(&merge_cypher).param("batch", batch.clone()))
                .await?;
            txn.run(
                query(pending_cypher)
                    .param("batch", batch)
                    .param("rel_type", rel_type.as_str()),
            )
            .await?;
            txn.commit().await?;

            written += group.len();
            debug!(rel_type = rel_type.as_str(), rows = group.len(), "relationship batch applied");
        }
        Ok(written)
    }

    /// Delete nodes by gid, cascading through CONTAINS|DEFINES and
    /// removing every pending that references any node in the closure.
    pub async fn delete_nodes(&self, gids: &[String]) -> Result<usize, GraphError> {
        let mut deleted = 0usize;
        for gid in gids {
            let cypher = "MATCH (n {gid: $gid}) \
                 OPTIONAL MATCH (n)-[:CONTAINS|DEFINES*1..]->(d) \
                 WITH collect(DISTINCT n) + collect(DISTINCT d) AS doomed \
                 UNWIND doomed AS node \
                 WITH collect(DISTINCT node) AS doomed, \
                      collect(DISTINCT node.gid) AS gids, \
                      collect(DISTINCT node.canonical_id) AS cids \
                 OPTIONAL MATCH (pr:PendingRelationship) \
                 WHERE pr.source_gid IN gids OR pr.target_canonical_id IN cids \
                 WITH doomed, collect(DISTINCT pr) AS pendings \
                 FOREACH (p IN pendings | DELETE p) \
                 WITH doomed \
                 UNWIND doomed AS node \
                 DETACH DELETE node \
                 RETURN count(node) AS deleted";
            let q = query(cypher).param("gid", gid.as_str());
            let mut stream = self.client.graph.execute(q).await?;
            if let Some(row) = stream.next().await? {
                let count: i64 = row.get("deleted")?;
                deleted += count as usize;
                if count > 0 {
                    info!(gid = gid.as_str(), cascade = count, "deleted node closure");
                }
            }
        }
        Ok(deleted)
    }

    /// Delete concrete edges and matching pendings for the given refs.
    pub async fn delete_relationships(&self, refs: &[RelationshipRef]) -> Result<(), GraphError> {
        for r in refs {
            let rel_type = match &r.rel_type {
                Some(raw) => Some(
                    RelationshipType::from_str(raw)
                        .map_err(GraphError::InvalidRelationshipType)?,
                ),
                None => None,
            };

            let edge_cypher = match rel_type {
                Some(t) => format!(
                    "MATCH (source {{gid: $source_gid}})-[r:`{}`]->(target) \
                     WHERE target.canonical_id = $target OR target.simple_canonical_id = $target \
                     DELETE r",
                    t.as_str()
                ),
                None => "MATCH (source {gid: $source_gid})-[r]->(target) \
                     WHERE target.canonical_id = $target OR target.simple_canonical_id = $target \
                     DELETE r"
                    .to_string(),
            };
            self.client
                .graph
                .run(
                    query(&edge_cypher)
                        .param("source_gid", r.source_gid.as_str())
                        .param("target", r.target_canonical_id.as_str()),
                )
                .await?;

            let pending_cypher = match rel_type {
                Some(t) => format!(
                    "MATCH (pr:PendingRelationship {{source_gid: $source_gid, \
                     target_canonical_id: $target, type: '{}'}}) DELETE pr",
                    t.as_str()
                ),
                None => "MATCH (pr:PendingRelationship {source_gid: $source_gid, \
                     target_canonical_id: $target}) DELETE pr"
                    .to_string(),
            };
            self.client
                .graph
                .run(
                    query(&pending_cypher)
                        .param("source_gid", r.source_gid.as_str())
                        .param("target", r.target_canonical_id.as_str()),
                )
                .await?;
        }
        Ok(())
    }

    /// Remove graph state owned by `file_path` that the latest analysis no
    /// longer contains: stale nodes (cascading their pendings), stale
    /// outgoing edges, stale pendings. Runs before merging the new delta
    /// so a re-analyzed file fully replaces its previous version.
    pub async fn prune_stale_file(
        &self,
        file_path: &str,
        keep_gids: &[String],
        keep_edge_keys: &[String],
    ) -> Result<(), GraphError> {
        let stale_nodes = "MATCH (n {file_path: $file_path}) \
             WHERE NOT n.gid IN $keep \
             WITH collect(n) AS doomed, collect(n.gid) AS gids, collect(n.canonical_id) AS cids \
             OPTIONAL MATCH (pr:PendingRelationship) \
             WHERE pr.source_gid IN gids OR pr.target_canonical_id IN cids \
             WITH doomed, collect(DISTINCT pr) AS pendings \
             FOREACH (p IN pendings | DELETE p) \
             WITH doomed \
             UNWIND doomed AS node \
             DETACH DELETE node";
        self.client
            .graph
            .run(
                query(stale_nodes)
                    .param("file_path", file_path)
                    .param("keep", string_list(keep_gids)),
            )
            .await?;

        let stale_edges = "MATCH (s {file_path: $file_path})-[r]->(t) \
             WHERE NOT ((s.gid + '|' + type(r) + '|' + \
                     coalesce(r.target_canonical_id, t.canonical_id, '')) IN $keep) \
             DELETE r";
        self.client
            .graph
            .run(
                query(stale_edges)
                    .param("file_path", file_path)
                    .param("keep", string_list(keep_edge_keys)),
            )
            .await?;

        let stale_pendings = "MATCH (n {file_path: $file_path}) \
             MATCH (pr:PendingRelationship {source_gid: n.gid}) \
             WHERE NOT ((n.gid + '|' + pr.type + '|' + pr.target_canonical_id) IN $keep) \
             DELETE pr";
        self.client
            .graph
            .run(
                query(stale_pendings)
                    .param("file_path", file_path)
                    .param("keep", string_list(keep_edge_keys)),
            )
            .await?;

        Ok(())
    }

    /// Resolve pendings that reference any of the given canonical ids,
    /// from either end. Called after every node batch.
    pub async fn resolve_pendings_for(
        &self,
        canonical_ids: &[String],
    ) -> Result<usize, GraphError> {
        if canonical_ids.is_empty() {
            return Ok(0);
        }

        // Target case: the new node is what a pending edge points at.
        let as_target = "MATCH (pr:PendingRelationship) \
             WHERE pr.target_canonical_id IN $cids OR pr.target_canonical_id IN $simple \
             RETURN pr.source_gid AS source_gid, pr.target_canonical_id AS target_canonical_id, \
                    pr.type AS rel_type, pr.properties_json AS properties_json";
        // Source case: the new node's gid is a pending edge's origin.
        let as_source = "MATCH (n) WHERE n.canonical_id IN $cids \
             MATCH (pr:PendingRelationship {source_gid: n.gid}) \
             RETURN pr.source_gid AS source_gid, pr.target_canonical_id AS target_canonical_id, \
                    pr.type AS rel_type, pr.properties_json AS properties_json";

        let simple: Vec<String> = canonical_ids
            .iter()
            .filter_map(|c| simple_form(c))
            .collect();

        let mut rows = Vec::new();
        for (cypher, needs_simple) in [(as_target, true), (as_source, false)] {
            let mut q = query(cypher).param("cids", string_list(canonical_ids));
            if needs_simple {
                q = q.param("simple", string_list(&simple));
            }
            let mut stream = self.client.graph.execute(q).await?;
            while let Some(row) = stream.next().await? {
                rows.push(PendingRow {
                    source_gid: row.get("source_gid")?,
                    target_canonical_id: row.get("target_canonical_id")?,
                    rel_type: row.get("rel_type")?,
                    properties_json: row.get("properties_json").ok(),
                });
            }
        }

        self.resolve_pending_rows(rows).await
    }

    /// One full drain pass: fetch pendings in batches and try to resolve
    /// each, until a batch comes back short or makes no progress.
    pub async fn resolve_all_pendings(&self, batch_size: usize) -> Result<usize, GraphError> {
        let mut total = 0usize;
        loop {
            let cypher = "MATCH (pr:PendingRelationship) \
                 RETURN pr.source_gid AS source_gid, pr.target_canonical_id AS target_canonical_id, \
                        pr.type AS rel_type, pr.properties_json AS properties_json \
                 LIMIT $limit";
            let q = query(cypher).param("limit", batch_size as i64);
            let mut rows = Vec::new();
            let mut stream = self.client.graph.execute(q).await?;
            while let Some(row) = stream.next().await? {
                rows.push(PendingRow {
                    source_gid: row.get("source_gid")?,
                    target_canonical_id: row.get("target_canonical_id")?,
                    rel_type: row.get("rel_type")?,
                    properties_json: row.get("properties_json").ok(),
                });
            }

            let fetched = rows.len();
            let resolved = self.resolve_pending_rows(rows).await?;
            total += resolved;
            if fetched < batch_size || resolved == 0 {
                break;
            }
        }
        if total > 0 {
            info!(resolved = total, "pending relationship drain complete");
        }
        Ok(total)
    }

    async fn resolve_pending_rows(&self, rows: Vec<PendingRow>) -> Result<usize, GraphError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut type_groups: HashMap<RelationshipType, Vec<PendingRow>> = HashMap::new();
        for row in rows {
            match RelationshipType::from_str(&row.rel_type) {
                Ok(t) => type_groups.entry(t).or_default().push(row),
                // A type outside the closed vocabulary never reaches the
                // graph through this writer; leave the row for inspection.
                Err(e) => warn!(error = %e, "skipping pending with unknown type"),
            }
        }

        let mut resolved = 0usize;
        for (rel_type, group) in type_groups {
            let cypher = format!(
                "UNWIND $batch AS row \
                 MATCH (source {{gid: row.source_gid}}) \
                 MATCH (target) \
                 WHERE target.canonical_id = row.target_canonical_id \
                    OR target.simple_canonical_id = row.target_canonical_id \
                 MATCH (pr:PendingRelationship {{source_gid: row.source_gid, \
                        target_canonical_id: row.target_canonical_id, type: '{0}'}}) \
                 MERGE (source)-[r:`{0}`]->(target) \
                 SET r += row.properties \
                 SET r.target_canonical_id = target.canonical_id \
                 DELETE pr \
                 RETURN count(r) AS resolved",
                rel_type.as_str()
            );

            let mut batch = BoltList::new();
            for row in &group {
                let mut bolt_row = BoltMap::new();
                bolt_row.put(
                    "source_gid".into(),
                    BoltType::String(row.source_gid.as_str().into()),
                );
                bolt_row.put(
                    "target_canonical_id".into(),
                    BoltType::String(row.target_canonical_id.as_str().into()),
                );
                let props = row
                    .properties_json
                    .as_deref()
                    .and_then(|raw| serde_json::from_str::<serde_json::Value>(raw).ok())
                    .and_then(|v| v.as_object().cloned())
                    .unwrap_or_default();
                bolt_row.put("properties".into(), BoltType::Map(object_to_bolt(&props)));
                batch.push(BoltType::Map(bolt_row));
            }

            let q = query(&cypher).param("batch", BoltType::List(batch));
            let mut stream = self.client.graph.execute(q).await?;
            if let Some(row) = stream.next().await? {
                let count: i64 = row.get("resolved")?;
                if count > 0 {
                    debug!(rel_type = rel_type.as_str(), count, "resolved pendings");
                }
                resolved += count as usize;
            }
        }
        Ok(resolved)
    }

    /// Number of PendingRelationship placeholders currently in the graph.
    pub async fn pending_count(&self) -> Result<usize, GraphError> {
        self.count("MATCH (pr:PendingRelationship) RETURN count(pr) AS n").await
    }

    pub async fn node_count(&self) -> Result<usize, GraphError> {
        self.count("MATCH (n) WHERE NOT n:PendingRelationship RETURN count(n) AS n")
            .await
    }

    pub async fn relationship_count(&self) -> Result<usize, GraphError> {
        self.count("MATCH ()-[r]->() RETURN count(r) AS n").await
    }

    async fn count(&self, cypher: &str) -> Result<usize, GraphError> {
        let mut stream = self.client.graph.execute(query(cypher)).await?;
        match stream.next().await? {
            Some(row) => {
                let n: i64 = row.get("n")?;
                Ok(n as usize)
            }
            None => Ok(0),
        }
    }
}

/// Labels are interpolated into Cypher; restrict them to identifier
/// characters and fall back to `Node` if nothing survives.
fn sanitized_labels(labels: &[String]) -> Vec<String> {
    let mut out: Vec<String> = labels
        .iter()
        .map(|l| {
            l.chars()
                .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
                .collect::<String>()
        })
        .filter(|l| !l.is_empty())
        .collect();
    if out.is_empty() {
        out.push("Node".to_string());
    }
    out
}

/// Signature-stripped form of a canonical id, when it has one.
fn simple_form(canonical_id: &str) -> Option<String> {
    let open = canonical_id.rfind('(')?;
    if !canonical_id.ends_with(')') || canonical_id[open..].contains("::") {
        return None;
    }
    Some(canonical_id[..open].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_sanitized_for_interpolation() {
        let labels = vec![
            "Function".to_string(),
            "Py`thon".to_string(),
            "{evil}".to_string(),
        ];
        assert_eq!(sanitized_labels(&labels), vec!["Function", "Python", "evil"]);
        assert_eq!(sanitized_labels(&["``".to_string()]), vec!["Node"]);
    }

    #[test]
    fn simple_form_strips_signatures_only() {
        assert_eq!(
            simple_form("a.py::Function::f(Any)").as_deref(),
            Some("a.py::Function::f")
        );
        assert_eq!(simple_form("a.py::Class::C"), None);
    }
}
