//! SQL schema analyzer.
//!
//! Extracts `Table` and `Column` nodes from `CREATE TABLE` statements so
//! the resolver's query heuristics have definition targets. Anything
//! beyond name extraction (constraints, types beyond a stored hint,
//! views) is out of scope.

use std::sync::OnceLock;

use regex::Regex;

use codeloom_common::{AnalysisJob, AnalyzerResult, NodeStub, Properties, RelationshipStub};
use codeloom_identity::{normalize_path, EntityKind, IdRequest};

use crate::idcache::CachedIdentity;
use crate::{Analyzer, AnalyzerError};

pub struct SqlAnalyzer;

impl SqlAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SqlAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

const CONSTRAINT_KEYWORDS: [&str; 8] = [
    "primary", "foreign", "unique", "constraint", "key", "check", "index", "references",
];

fn create_table_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)create\s+table\s+(?:if\s+not\s+exists\s+)?[`"]?(\w+)[`"]?\s*\((.*)\)"#)
            .expect("create table pattern compiles")
    })
}

impl Analyzer for SqlAnalyzer {
    fn language(&self) -> &'static str {
        "sql"
    }

    fn analyze(&self, job: &AnalysisJob, content: &str) -> Result<AnalyzerResult, AnalyzerError> {
        let ids = CachedIdentity::default();
        let path = normalize_path(&job.file_path);
        let basename = path.rsplit('/').next().unwrap_or(&path).to_string();

        let mut result = AnalyzerResult::empty(&job.file_path, "sql");

        let file_id = ids.generate(&IdRequest::new(&path, EntityKind::File, &basename))?;
        result.nodes_upserted.push(NodeStub {
            gid: file_id.gid.clone(),
            canonical_id: file_id.canonical_id.clone(),
            name: basename,
            file_path: path.clone(),
            language: "sql".to_string(),
            labels: vec!["File".to_string()],
            properties: Properties::new(),
        });

        for statement in content.split(';') {
            let Some(captures) = create_table_re().captures(statement) else {
                continue;
            };
            let table_name = captures[1].to_lowercase();
            let body = &captures[2];
            let line = line_of(content, statement);

            let table_id =
                ids.generate(&IdRequest::new(&path, EntityKind::Table, &table_name))?;
            let mut table_props = Properties::new();
            table_props.insert("start_line".to_string(), line.into());
            result.nodes_upserted.push(NodeStub {
                gid: table_id.gid.clone(),
                canonical_id: table_id.canonical_id.clone(),
                name: table_name.clone(),
                file_path: path.clone(),
                language: "sql".to_string(),
                labels: vec!["Table".to_string()],
                properties: table_props,
            });
            result.relationships_upserted.push(RelationshipStub {
                source_gid: file_id.gid.clone(),
                target_canonical_id: table_id.canonical_id.clone(),
                rel_type: "CONTAINS".to_string(),
                properties: Properties::new(),
            });

            for (column, column_type) in parse_columns(body) {
                let column_id = ids.generate(
                    &IdRequest::new(&path, EntityKind::Column, &column)
                        .with_parent(&table_id.canonical_id),
                )?;
                let mut props = Properties::new();
                props.insert("table".to_string(), table_name.clone().into());
                if let Some(ct) = column_type {
                    props.insert("column_type".to_string(), ct.into());
                }
                result.nodes_upserted.push(NodeStub {
                    gid: column_id.gid.clone(),
                    canonical_id: column_id.canonical_id.clone(),
                    name: column,
                    file_path: path.clone(),
                    language: "sql".to_string(),
                    labels: vec!["Column".to_string()],
                    properties: props,
                });
                result.relationships_upserted.push(RelationshipStub {
                    source_gid: table_id.gid.clone(),
                    target_canonical_id: column_id.canonical_id.clone(),
                    rel_type: "CONTAINS".to_string(),
                    properties: Properties::new(),
                });
            }
        }

        Ok(result)
    }
}

/// Split a CREATE TABLE body on top-level commas and take each entry's
/// leading identifier as a column name, skipping table constraints.
fn parse_columns(body: &str) -> Vec<(String, Option<String>)> {
    let mut columns = Vec::new();
    for entry in split_top_level(body) {
        let mut tokens = entry.split_whitespace();
        let Some(first) = tokens.next() else {
            continue;
        };
        let name = first.trim_matches(|c| c == '`' || c == '"').to_lowercase();
        if name.is_empty()
            || CONSTRAINT_KEYWORDS.contains(&name.as_str())
            || !name.chars().next().map(|c| c.is_ascii_alphabetic() || c == '_').unwrap_or(false)
        {
            continue;
        }
        let column_type = tokens.next().map(|t| t.trim_matches(',').to_uppercase());
        columns.push((name, column_type));
    }
    columns
}

fn split_top_level(body: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (idx, c) in body.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(body[start..idx].trim());
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(body[start..].trim());
    parts
}

fn line_of(content: &str, statement: &str) -> u64 {
    match content.find(statement.trim_start_matches(['\n', '\r'])) {
        Some(offset) => content[..offset].lines().count() as u64 + 1,
        None => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeloom_common::EventType;

    fn job(path: &str) -> AnalysisJob {
        AnalysisJob {
            file_path: path.to_string(),
            event_type: EventType::Created,
            id: None,
        }
    }

    #[test]
    fn create_table_produces_table_and_columns() {
        let analyzer = SqlAnalyzer::new();
        let content = "CREATE TABLE users(id INT, name TEXT, PRIMARY KEY (id));";
        let result = analyzer.analyze(&job("schema.sql"), content).unwrap();

        let tables: Vec<_> = result
            .nodes_upserted
            .iter()
            .filter(|n| n.labels[0] == "Table")
            .collect();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].canonical_id, "schema.sql::Table::users");

        let columns: Vec<_> = result
            .nodes_upserted
            .iter()
            .filter(|n| n.labels[0] == "Column")
            .collect();
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name"]);
        assert_eq!(
            columns[1].canonical_id,
            "schema.sql::Table::users::Column::name"
        );
        assert_eq!(columns[0].properties.get("column_type").unwrap(), "INT");

        // Containment: file → table → columns.
        let contains: Vec<_> = result
            .relationships_upserted
            .iter()
            .filter(|r| r.rel_type == "CONTAINS")
            .collect();
        assert_eq!(contains.len(), 3);
    }

    #[test]
    fn multiple_statements_and_constraints() {
        let analyzer = SqlAnalyzer::new();
        let content = r#"
CREATE TABLE users (
    id INT,
    name TEXT,
    FOREIGN KEY (id) REFERENCES accounts(id)
);

CREATE TABLE IF NOT EXISTS orders (
    order_id INT,
    user_id INT
);

INSERT INTO users VALUES (1, 'x');
"#;
        let result = analyzer.analyze(&job("db/schema.sql"), content).unwrap();
        let tables: Vec<&str> = result
            .nodes_upserted
            .iter()
            .filter(|n| n.labels[0] == "Table")
            .map(|n| n.name.as_str())
            .collect();
        assert_eq!(tables, vec!["users", "orders"]);

        let columns: Vec<&str> = result
            .nodes_upserted
            .iter()
            .filter(|n| n.labels[0] == "Column")
            .map(|n| n.name.as_str())
            .collect();
        assert_eq!(columns, vec!["id", "name", "order_id", "user_id"]);
    }

    #[test]
    fn files_without_tables_still_emit_the_file_node() {
        let analyzer = SqlAnalyzer::new();
        let result = analyzer
            .analyze(&job("queries.sql"), "SELECT * FROM users;")
            .unwrap();
        assert_eq!(result.nodes_upserted.len(), 1);
        assert_eq!(result.nodes_upserted[0].labels[0], "File");
    }
}
