//! Cross-language heuristics run over the final node set: HTTP call →
//! declared endpoint matching by URL path, and database query → table /
//! column matching through the SQL tokenizer.

use std::collections::HashMap;

use codeloom_common::{GraphRelationship, NodeStub, RelationshipType};
use tracing::{debug, warn};

use crate::sql::{self, QueryKind};

/// Strip scheme, host, query string and surrounding slashes from a URL so
/// call sites and endpoint declarations compare equal:
/// `http://api:8000/items/list?page=2` → `items/list`.
pub fn normalize_url_path(url: &str) -> String {
    let mut rest = url;
    if let Some(idx) = rest.find("://") {
        rest = &rest[idx + 3..];
        rest = match rest.find('/') {
            Some(slash) => &rest[slash..],
            None => "",
        };
    }
    let rest = rest.split(['?', '#']).next().unwrap_or("");
    rest.trim_matches('/').to_string()
}

/// Match `ApiCall` nodes against `ApiEndpoint` nodes by normalized path.
pub fn match_api_calls(nodes: &[NodeStub]) -> Vec<GraphRelationship> {
    let mut endpoints: HashMap<String, &NodeStub> = HashMap::new();
    for node in nodes.iter().filter(|n| primary(n) == "ApiEndpoint") {
        let path = node
            .properties
            .get("path")
            .and_then(|v| v.as_str())
            .unwrap_or(&node.name);
        let normalized = normalize_url_path(path);
        if normalized.is_empty() {
            continue;
        }
        if let Some(existing) = endpoints.insert(normalized.clone(), node) {
            warn!(
                path = normalized,
                first = existing.gid,
                second = node.gid,
                "duplicate API endpoint path"
            );
        }
    }

    let mut relationships = Vec::new();
    for call in nodes.iter().filter(|n| primary(n) == "ApiCall") {
        let Some(url) = call.properties.get("url").and_then(|v| v.as_str()) else {
            continue;
        };
        let normalized = normalize_url_path(url);
        match endpoints.get(&normalized) {
            Some(endpoint) => {
                debug!(url, endpoint = endpoint.canonical_id, "matched API call to endpoint");
                relationships.push(heuristic_edge(
                    &call.gid,
                    &endpoint.canonical_id,
                    RelationshipType::CallsApi,
                    "url_path",
                ));
            }
            None => {
                debug!(url, path = normalized, "no matching API endpoint");
            }
        }
    }
    relationships
}

/// Match `DatabaseQuery` nodes against `Table` and `Column` nodes by the
/// names the tokenizer extracts from the query string.
pub fn match_database_queries(nodes: &[NodeStub]) -> Vec<GraphRelationship> {
    let mut tables: HashMap<String, &NodeStub> = HashMap::new();
    let mut columns: HashMap<String, &NodeStub> = HashMap::new();
    for node in nodes {
        match primary(node) {
            "Table" => {
                if let Some(existing) = tables.insert(node.name.to_lowercase(), node) {
                    warn!(name = node.name, first = existing.gid, "duplicate table name");
                }
            }
            "Column" => {
                // Column names are not globally unique; first-seen wins,
                // matching the duplicate-definition policy elsewhere.
                columns.entry(node.name.to_lowercase()).or_insert(node);
            }
            _ => {}
        }
    }

    let mut relationships = Vec::new();
    for query_node in nodes.iter().filter(|n| primary(n) == "DatabaseQuery") {
        let Some(query) = query_node.properties.get("query").and_then(|v| v.as_str()) else {
            continue;
        };
        let names = sql::extract_names(query);
        let table_rel_type = match sql::classify(query) {
            QueryKind::Modifies => RelationshipType::ModifiesTable,
            QueryKind::Reads => RelationshipType::ReadsTable,
            QueryKind::Other => RelationshipType::QueriesTable,
        };

        for table in &names.tables {
            if let Some(node) = tables.get(table) {
                relationships.push(heuristic_edge(
                    &query_node.gid,
                    &node.canonical_id,
                    table_rel_type,
                    "table_name_in_query",
                ));
            }
        }
        for column in &names.columns {
            if let Some(node) = columns.get(column) {
                relationships.push(heuristic_edge(
                    &query_node.gid,
                    &node.canonical_id,
                    RelationshipType::UsesColumn,
                    "column_name_in_query",
                ));
            }
        }
    }
    relationships
}

fn primary(node: &NodeStub) -> &str {
    node.labels.first().map(String::as_str).unwrap_or("")
}

fn heuristic_edge(
    source_gid: &str,
    target_canonical_id: &str,
    rel_type: RelationshipType,
    matched_on: &str,
) -> GraphRelationship {
    let mut properties = codeloom_common::Properties::new();
    properties.insert(
        "heuristic_match".to_string(),
        serde_json::Value::String(matched_on.to_string()),
    );
    GraphRelationship {
        source_gid: source_gid.to_string(),
        target_canonical_id: target_canonical_id.to_string(),
        rel_type,
        properties,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_normalization() {
        assert_eq!(normalize_url_path("http://api:8000/items/list?page=2"), "items/list");
        assert_eq!(normalize_url_path("/items/list/"), "items/list");
        assert_eq!(normalize_url_path("items/list"), "items/list");
        assert_eq!(normalize_url_path("https://host"), "");
    }

    fn node(label: &str, gid: &str, canonical: &str, name: &str, props: &[(&str, &str)]) -> NodeStub {
        let mut properties = codeloom_common::Properties::new();
        for (k, v) in props {
            properties.insert(k.to_string(), serde_json::Value::String(v.to_string()));
        }
        NodeStub {
            gid: gid.to_string(),
            canonical_id: canonical.to_string(),
            name: name.to_string(),
            file_path: String::new(),
            language: "python".to_string(),
            labels: vec![label.to_string()],
            properties,
        }
    }

    #[test]
    fn api_call_matches_endpoint_by_path() {
        let nodes = vec![
            node(
                "ApiEndpoint",
                "py:ep",
                "api.py::ApiEndpoint::/items/list",
                "/items/list",
                &[("path", "/items/list")],
            ),
            node(
                "ApiCall",
                "py:call",
                "ui.py::Function::load()::ApiCall::requests.get@L4",
                "requests.get@L4",
                &[("url", "http://backend:8000/items/list?limit=5")],
            ),
        ];
        let rels = match_api_calls(&nodes);
        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].rel_type, RelationshipType::CallsApi);
        assert_eq!(rels[0].target_canonical_id, "api.py::ApiEndpoint::/items/list");
        assert_eq!(
            rels[0].properties.get("heuristic_match").unwrap(),
            "url_path"
        );
    }

    #[test]
    fn select_query_reads_table_and_uses_column() {
        let nodes = vec![
            node("Table", "sql:t", "schema.sql::Table::users", "users", &[]),
            node(
                "Column",
                "sql:c",
                "schema.sql::Table::users::Column::name",
                "name",
                &[],
            ),
            node(
                "DatabaseQuery",
                "py:q",
                "svc.py::Function::fetch()::DatabaseQuery::cursor.execute@L9",
                "cursor.execute@L9",
                &[("query", "SELECT name FROM users WHERE id=?")],
            ),
        ];
        let rels = match_database_queries(&nodes);
        let types: Vec<_> = rels.iter().map(|r| r.rel_type).collect();
        assert!(types.contains(&RelationshipType::ReadsTable));
        assert!(types.contains(&RelationshipType::UsesColumn));
    }

    #[test]
    fn update_query_modifies_table() {
        let nodes = vec![
            node("Table", "sql:t", "schema.sql::Table::users", "users", &[]),
            node(
                "DatabaseQuery",
                "py:q",
                "svc.py::DatabaseQuery::cursor.execute@L2",
                "q",
                &[("query", "UPDATE users SET name='x' WHERE id=1")],
            ),
        ];
        let rels = match_database_queries(&nodes);
        assert_eq!(rels[0].rel_type, RelationshipType::ModifiesTable);
    }
}
