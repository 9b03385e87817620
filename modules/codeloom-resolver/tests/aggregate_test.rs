//! Aggregation scenarios: cross-file call resolution, import linking,
//! SQL cross-language matching, and external-node synthesis.

use codeloom_common::{AnalyzerResult, NodeStub, Properties, RelationshipStub, RelationshipType};
use codeloom_identity::{EntityKind, IdRequest, IdentityProvider, IdentityService};
use codeloom_resolver::aggregate;

fn props(pairs: &[(&str, serde_json::Value)]) -> Properties {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn node(
    label: &str,
    file_path: &str,
    language: &str,
    kind: EntityKind,
    name: &str,
    parent: Option<&str>,
    params: Vec<String>,
) -> NodeStub {
    let mut request = IdRequest::new(file_path, kind, name).with_params(params);
    if let Some(parent) = parent {
        request = request.with_parent(parent);
    }
    let id = IdentityService.generate_id(&request).unwrap();
    NodeStub {
        gid: id.gid,
        canonical_id: id.canonical_id,
        name: name.to_string(),
        file_path: file_path.to_string(),
        language: language.to_string(),
        labels: vec![label.to_string()],
        properties: Properties::new(),
    }
}

/// Build the analyzer result for `module.py`, which defines
/// `utility_function(v)`.
fn module_py() -> AnalyzerResult {
    let file = node("File", "module.py", "python", EntityKind::File, "module.py", None, vec![]);
    let func = node(
        "Function",
        "module.py",
        "python",
        EntityKind::Function,
        "utility_function",
        Some(&file.canonical_id),
        vec!["Any".to_string()],
    );

    let mut result = AnalyzerResult::empty("module.py", "python");
    result.relationships_upserted.push(RelationshipStub {
        source_gid: file.gid.clone(),
        target_canonical_id: func.canonical_id.clone(),
        rel_type: "CONTAINS".to_string(),
        properties: Properties::new(),
    });
    result.nodes_upserted = vec![file, func];
    result
}

/// Build the analyzer result for `main.py`:
/// `from module import utility_function; def main(): utility_function("x")`.
fn main_py() -> AnalyzerResult {
    let file = node("File", "main.py", "python", EntityKind::File, "main.py", None, vec![]);
    let main_fn = node(
        "Function",
        "main.py",
        "python",
        EntityKind::Function,
        "main",
        Some(&file.canonical_id),
        vec![],
    );

    let mut result = AnalyzerResult::empty("main.py", "python");
    result.relationships_upserted.push(RelationshipStub {
        source_gid: file.gid.clone(),
        target_canonical_id: main_fn.canonical_id.clone(),
        rel_type: "CONTAINS".to_string(),
        properties: Properties::new(),
    });
    result.relationships_upserted.push(RelationshipStub {
        source_gid: file.gid.clone(),
        target_canonical_id: "module".to_string(),
        rel_type: "IMPORTS".to_string(),
        properties: props(&[
            ("imported_name", "utility_function".into()),
            ("source_module", "module".into()),
            ("level", 0.into()),
        ]),
    });
    result.relationships_upserted.push(RelationshipStub {
        source_gid: main_fn.gid.clone(),
        target_canonical_id: "python::Function::utility_function".to_string(),
        rel_type: "CALLS".to_string(),
        properties: Properties::new(),
    });
    result.nodes_upserted = vec![file, main_fn];
    result
}

#[test]
fn cross_file_call_resolves_in_one_batch() {
    let delta = aggregate(&[module_py(), main_py()]);

    let call = delta
        .relationships
        .iter()
        .find(|r| r.rel_type == RelationshipType::Calls)
        .expect("CALLS edge present");
    assert_eq!(
        call.target_canonical_id,
        "module.py::Function::utility_function(Any)"
    );

    let import = delta
        .relationships
        .iter()
        .find(|r| r.rel_type == RelationshipType::Imports)
        .expect("IMPORTS edge present");
    assert_eq!(import.target_canonical_id, "module.py::File::module.py");

    // Both targets are definitions in this batch, so nothing needs an
    // External placeholder.
    assert!(delta.nodes.iter().all(|n| n.labels[0] != "External"));
}

#[test]
fn lone_caller_predicts_signature_less_target() {
    let delta = aggregate(&[main_py()]);

    let call = delta
        .relationships
        .iter()
        .find(|r| r.rel_type == RelationshipType::Calls)
        .unwrap();
    // The callee's file has not been analyzed; the target is predicted
    // from the import without a signature and left for the pending
    // mechanism.
    assert_eq!(call.target_canonical_id, "module.py::Function::utility_function");

    let import = delta
        .relationships
        .iter()
        .find(|r| r.rel_type == RelationshipType::Imports)
        .unwrap();
    assert_eq!(import.target_canonical_id, "module.py::File::module.py");

    // Repo-path-shaped targets must NOT be externalized.
    assert!(delta.nodes.iter().all(|n| n.labels[0] != "External"));
}

#[test]
fn stdlib_call_and_import_become_external() {
    let file = node("File", "app.py", "python", EntityKind::File, "app.py", None, vec![]);
    let func = node(
        "Function",
        "app.py",
        "python",
        EntityKind::Function,
        "run",
        Some(&file.canonical_id),
        vec![],
    );
    let mut result = AnalyzerResult::empty("app.py", "python");
    result.relationships_upserted.push(RelationshipStub {
        source_gid: file.gid.clone(),
        target_canonical_id: "os".to_string(),
        rel_type: "IMPORTS".to_string(),
        properties: props(&[("source_module", "os".into()), ("level", 0.into())]),
    });
    result.relationships_upserted.push(RelationshipStub {
        source_gid: func.gid.clone(),
        target_canonical_id: "python::Function::print".to_string(),
        rel_type: "CALLS".to_string(),
        properties: Properties::new(),
    });
    result.nodes_upserted = vec![file, func];

    let delta = aggregate(&[result]);

    let externals: Vec<_> = delta
        .nodes
        .iter()
        .filter(|n| n.labels[0] == "External")
        .collect();
    let canonicals: Vec<_> = externals.iter().map(|n| n.canonical_id.as_str()).collect();
    assert!(canonicals.contains(&"python::Module::os"));
    assert!(canonicals.contains(&"python::Function::print"));

    // The import edge now points at the external module node.
    let import = delta
        .relationships
        .iter()
        .find(|r| r.rel_type == RelationshipType::Imports)
        .unwrap();
    assert_eq!(import.target_canonical_id, "python::Module::os");
}

#[test]
fn sql_cross_language_scenario() {
    // schema.sql defines users(id, name); a python file runs a SELECT.
    let sql_file = node("File", "schema.sql", "sql", EntityKind::File, "schema.sql", None, vec![]);
    let table = node("Table", "schema.sql", "sql", EntityKind::Table, "users", None, vec![]);
    let id_col = node(
        "Column",
        "schema.sql",
        "sql",
        EntityKind::Column,
        "id",
        Some(&table.canonical_id),
        vec![],
    );
    let name_col = node(
        "Column",
        "schema.sql",
        "sql",
        EntityKind::Column,
        "name",
        Some(&table.canonical_id),
        vec![],
    );
    let mut sql_result = AnalyzerResult::empty("schema.sql", "sql");
    sql_result.nodes_upserted = vec![sql_file, table.clone(), id_col, name_col.clone()];

    let py_file = node("File", "svc.py", "python", EntityKind::File, "svc.py", None, vec![]);
    let fetch = node(
        "Function",
        "svc.py",
        "python",
        EntityKind::Function,
        "fetch",
        Some(&py_file.canonical_id),
        vec![],
    );
    let mut query_node = node(
        "DatabaseQuery",
        "svc.py",
        "python",
        EntityKind::DatabaseQuery,
        "cursor.execute@L3",
        Some(&fetch.canonical_id),
        vec![],
    );
    query_node.properties = props(&[(
        "query",
        "SELECT name FROM users WHERE id=?".into(),
    )]);
    let mut py_result = AnalyzerResult::empty("svc.py", "python");
    py_result.nodes_upserted = vec![py_file, fetch, query_node.clone()];

    let delta = aggregate(&[sql_result, py_result]);

    let reads = delta
        .relationships
        .iter()
        .find(|r| r.rel_type == RelationshipType::ReadsTable)
        .expect("READS_TABLE edge");
    assert_eq!(reads.source_gid, query_node.gid);
    assert_eq!(reads.target_canonical_id, table.canonical_id);

    let uses = delta
        .relationships
        .iter()
        .filter(|r| r.rel_type == RelationshipType::UsesColumn)
        .collect::<Vec<_>>();
    assert!(uses.iter().any(|r| r.target_canonical_id == name_col.canonical_id));
}

#[test]
fn duplicate_relationships_are_suppressed() {
    let delta = aggregate(&[module_py(), main_py(), main_py()]);
    let calls: Vec<_> = delta
        .relationships
        .iter()
        .filter(|r| r.rel_type == RelationshipType::Calls)
        .collect();
    assert_eq!(calls.len(), 1);
}

#[test]
fn provenance_properties_are_attached() {
    let delta = aggregate(&[module_py(), main_py()]);
    let call = delta
        .relationships
        .iter()
        .find(|r| r.rel_type == RelationshipType::Calls)
        .unwrap();
    assert_eq!(call.properties.get("analyzer").unwrap(), "python_analyzer");
    assert_eq!(
        call.properties.get("original_relationship_type").unwrap(),
        "CALLS"
    );
}

#[test]
fn failed_results_only_carry_deletions() {
    let mut failed = AnalyzerResult::failed("broken.py", "python", "SyntaxError: line 3");
    failed.nodes_deleted.push("python:deadbeef".to_string());
    let delta = aggregate(&[failed]);
    assert!(delta.nodes.is_empty());
    assert!(delta.relationships.is_empty());
    assert_eq!(delta.nodes_deleted, vec!["python:deadbeef".to_string()]);
}
