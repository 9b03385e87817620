//! Orchestrator/resolver: turns raw analyzer results into the final graph
//! delta ready for ingestion.
//!
//! Four passes over the incoming batch:
//! 1. collect node stubs and index them (gid, canonical id, containment);
//! 2. canonicalize labels and build the definition registry;
//! 3. cross-language heuristics over the final nodes (API URL matching,
//!    SQL table/column extraction);
//! 4. map analyzer relationship types onto the closed vocabulary and
//!    resolve call / reference / import targets through the registry,
//!    suppressing duplicates of heuristic edges.
//!
//! Targets that stay unresolved and sit in a language namespace
//! (`python::…`) are materialized as `:External` nodes; repo-path-shaped
//! targets are left for the pending-relationship mechanism.

pub mod heuristics;
pub mod imports;
pub mod labels;
pub mod registry;
pub mod sql;

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use codeloom_common::{
    AnalyzerResult, GraphDelta, GraphRelationship, NodeStub, Properties, RelationshipType,
};
use codeloom_identity::{gid_for, normalize_path, strip_signature};

use imports::{is_stdlib_module, predict_module_path, ImportIndex};
use registry::DefinitionRegistry;

/// Aggregate one or more analyzer results into a unified graph delta.
pub fn aggregate(results: &[AnalyzerResult]) -> GraphDelta {
    let mut delta = GraphDelta::default();
    let mut nodes: Vec<NodeStub> = Vec::new();
    let mut node_by_gid: HashMap<String, usize> = HashMap::new();
    let mut registry = DefinitionRegistry::default();
    let mut import_index = ImportIndex::default();
    // child canonical id → parent gid, from CONTAINS stubs
    let mut parent_of: HashMap<String, String> = HashMap::new();

    // Pass 1 + 2: collect and canonicalize.
    for result in results {
        if let Some(error) = &result.error {
            warn!(file = result.file_path, error, "analysis failed; applying deletions only");
        }

        for stub in &result.nodes_upserted {
            if node_by_gid.contains_key(&stub.gid) {
                continue;
            }
            let primary = stub
                .labels
                .first()
                .cloned()
                .unwrap_or_else(|| "Unknown".to_string());
            let mut node = stub.clone();
            node.labels = labels::final_labels(&primary, &stub.language);
            let mapped = node.labels[0].clone();

            if matches!(mapped.as_str(), "Function" | "Method")
                && !node.properties.contains_key("simple_canonical_id")
            {
                if let Some(simple) = strip_signature(&node.canonical_id) {
                    node.properties
                        .insert("simple_canonical_id".to_string(), simple.into());
                }
            }
            node.properties
                .entry("analyzer".to_string())
                .or_insert_with(|| format!("{}_analyzer", result.language).into());
            node.properties
                .entry("original_node_type".to_string())
                .or_insert_with(|| primary.clone().into());

            registry.insert(&mapped, &node.gid, &node.canonical_id, &node.name, &node.file_path);
            node_by_gid.insert(node.gid.clone(), nodes.len());
            nodes.push(node);
        }

        let source_file = normalize_path(&result.file_path);
        for rel in &result.relationships_upserted {
            match clean_type(&rel.rel_type) {
                "IMPORTS" => import_index.record(&source_file, rel),
                "CONTAINS" => {
                    parent_of.insert(rel.target_canonical_id.clone(), rel.source_gid.clone());
                }
                _ => {}
            }
        }

        delta.nodes_deleted.extend(result.nodes_deleted.iter().cloned());
        delta
            .relationships_deleted
            .extend(result.relationships_deleted.iter().cloned());
    }

    // Pass 3: cross-language heuristics over the final node set.
    let mut relationships = heuristics::match_api_calls(&nodes);
    relationships.extend(heuristics::match_database_queries(&nodes));
    let mut edge_keys: HashSet<(String, RelationshipType, String)> = relationships
        .iter()
        .map(|r| (r.source_gid.clone(), r.rel_type, r.target_canonical_id.clone()))
        .collect();

    // Pass 4: map analyzer relationships.
    for result in results {
        if result.error.is_some() {
            continue;
        }
        let analyzer_tag = format!("{}_analyzer", result.language);

        for rel in &result.relationships_upserted {
            let raw = clean_type(&rel.rel_type);
            let source = node_by_gid.get(&rel.source_gid).map(|idx| &nodes[*idx]);
            let manual = rel
                .properties
                .get("manual_hint")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);

            let target = if manual {
                rel.target_canonical_id.clone()
            } else {
                match raw {
                    "CALLS" | "CALLS_HINT" => resolve_call_target(
                        &rel.target_canonical_id,
                        source,
                        &registry,
                        &import_index,
                    ),
                    "REFERENCES" => resolve_reference_target(
                        &rel.target_canonical_id,
                        source,
                        &registry,
                        &parent_of,
                        &nodes,
                        &node_by_gid,
                    ),
                    "USES_TYPE" => {
                        resolve_type_target(&rel.target_canonical_id, source, &registry)
                    }
                    "IMPORTS" => resolve_import_target(rel, &result.language, source, &registry),
                    _ => rel.target_canonical_id.clone(),
                }
            };

            let mapped = map_relationship_type(raw);
            let refined = refine_by_target(mapped, &target, &registry);

            let key = (rel.source_gid.clone(), refined, target.clone());
            if !edge_keys.insert(key) {
                continue;
            }

            let mut properties = rel.properties.clone();
            properties
                .entry("analyzer".to_string())
                .or_insert_with(|| analyzer_tag.clone().into());
            properties.insert(
                "original_relationship_type".to_string(),
                raw.to_string().into(),
            );

            relationships.push(GraphRelationship {
                source_gid: rel.source_gid.clone(),
                target_canonical_id: target,
                rel_type: refined,
                properties,
            });
        }
    }

    // Pass 5: synthesize External nodes for language-namespace targets no
    // analyzer will ever produce.
    let mut externals_seen: HashSet<String> = HashSet::new();
    for rel in &relationships {
        let target = &rel.target_canonical_id;
        if registry.resolve_loose(target).is_some() || !is_language_namespace(target) {
            continue;
        }
        if !externals_seen.insert(target.clone()) {
            continue;
        }
        nodes.push(external_node(target));
    }

    info!(
        nodes = nodes.len(),
        relationships = relationships.len(),
        externals = externals_seen.len(),
        definitions = registry.len(),
        "aggregation complete"
    );

    delta.nodes = nodes;
    delta.relationships = relationships;
    delta
}

fn clean_type(raw: &str) -> &str {
    raw.trim().trim_start_matches(':')
}

/// Analyzer-specific relationship tags → canonical vocabulary.
fn map_relationship_type(raw: &str) -> RelationshipType {
    match raw {
        "CONTAINS" => RelationshipType::Contains,
        "CALLS" | "CALLS_HINT" => RelationshipType::Calls,
        "IMPORTS" => RelationshipType::Imports,
        "REFERENCES" => RelationshipType::References,
        "INHERITS_FROM" => RelationshipType::InheritsFrom,
        "IMPLEMENTS" => RelationshipType::Implements,
        "HAS_PARAMETER" => RelationshipType::HasParameter,
        "RETURNS" => RelationshipType::Returns,
        "TYPE_ARGUMENT" => RelationshipType::TypeArgument,
        "CALLS_API" | "FETCHES_HINT" => RelationshipType::CallsApi,
        "QUERIES" | "QUERIES_DB" | "QUERIES_HINT" => RelationshipType::Queries,
        "QUERIES_TABLE" => RelationshipType::QueriesTable,
        "MODIFIES_TABLE" => RelationshipType::ModifiesTable,
        "READS_TABLE" => RelationshipType::ReadsTable,
        "USES_COLUMN" => RelationshipType::UsesColumn,
        "USES_ENVIRONMENT_VARIABLE" | "USES_ENV_VAR_HINT" => {
            RelationshipType::UsesEnvironmentVariable
        }
        "USES_TYPE" => RelationshipType::UsesType,
        "RELATED_TO" => RelationshipType::RelatedTo,
        other => {
            debug!(rel_type = other, "unmapped relationship type, falling back to RELATED_TO");
            RelationshipType::RelatedTo
        }
    }
}

/// Refine a mapped type by what the target actually is, when the base
/// mapping was generic.
fn refine_by_target(
    mapped: RelationshipType,
    target: &str,
    registry: &DefinitionRegistry,
) -> RelationshipType {
    if !matches!(
        mapped,
        RelationshipType::Calls
            | RelationshipType::CallsApi
            | RelationshipType::Queries
            | RelationshipType::RelatedTo
    ) {
        return mapped;
    }
    let Some(definition) = registry.resolve_loose(target) else {
        return mapped;
    };
    match definition.label.as_str() {
        "ApiEndpoint" => RelationshipType::CallsApi,
        "Table" => RelationshipType::QueriesTable,
        "Column" => RelationshipType::UsesColumn,
        _ => mapped,
    }
}

/// `<lang>::…` with a first segment that cannot be a repo path.
fn is_language_namespace(target: &str) -> bool {
    match target.split_once("::") {
        Some((first, rest)) => {
            !first.is_empty() && !rest.is_empty() && !first.contains('.') && !first.contains('/')
        }
        None => false,
    }
}

fn external_node(canonical_id: &str) -> NodeStub {
    let language = canonical_id.split("::").next().unwrap_or("unknown");
    let name_segment = canonical_id.rsplit("::").next().unwrap_or(canonical_id);
    let name = match name_segment.find('(') {
        Some(idx) if name_segment.ends_with(')') => &name_segment[..idx],
        _ => name_segment,
    };
    let mut properties = Properties::new();
    properties.insert("external".to_string(), true.into());
    NodeStub {
        gid: gid_for(language, canonical_id),
        canonical_id: canonical_id.to_string(),
        name: name.to_string(),
        file_path: String::new(),
        language: language.to_string(),
        labels: vec!["External".to_string()],
        properties,
    }
}

/// Resolve a heuristic call target (`python::Function::<name>`,
/// `python::Object::<obj>::Method::<m>`, `python::Method::<m>`) against
/// the definition registry: same file first, then through the source
/// file's imports, then a unique global match. Import-predicted targets
/// use the signature-less form and rely on signature-blind matching at
/// ingest time.
fn resolve_call_target(
    target: &str,
    source: Option<&NodeStub>,
    registry: &DefinitionRegistry,
    import_index: &ImportIndex,
) -> String {
    if registry.contains(target) {
        return target.to_string();
    }
    if !is_language_namespace(target) {
        return target.to_string();
    }
    let source_file = source.map(|n| n.file_path.as_str()).unwrap_or("");
    let segments: Vec<&str> = target.split("::").collect();

    match segments.as_slice() {
        [_, "Function", name] => {
            if let Some(found) = callable_in_file(registry, name, source_file) {
                return found;
            }
            if let Some(imp) = import_index.symbol_import(source_file, name) {
                let real_name = imp.imported_name.as_deref().unwrap_or(name);
                let module = if imp.module.is_empty() {
                    real_name
                } else {
                    imp.module.as_str()
                };
                if !is_stdlib_module(module) {
                    if let Some(path) = predict_module_path(source_file, module, imp.level) {
                        if let Some(found) = callable_in_file(registry, real_name, &path) {
                            return found;
                        }
                        return format!("{path}::Function::{real_name}");
                    }
                }
            }
            unique_callable(registry, name).unwrap_or_else(|| target.to_string())
        }
        [_, "Object", object, "Method", method] => {
            if let Some(imp) = import_index.module_import(source_file, object) {
                if is_stdlib_module(&imp.module) {
                    return target.to_string();
                }
                if let Some(path) = predict_module_path(source_file, &imp.module, imp.level) {
                    if let Some(found) = callable_in_file(registry, method, &path) {
                        return found;
                    }
                    return format!("{path}::Function::{method}");
                }
            }
            method_in_file(registry, method, source_file)
                .or_else(|| unique_method(registry, method))
                .unwrap_or_else(|| target.to_string())
        }
        [_, "Method", method] => method_in_file(registry, method, source_file)
            .or_else(|| unique_method(registry, method))
            .unwrap_or_else(|| target.to_string()),
        _ => target.to_string(),
    }
}

fn callable_in_file(registry: &DefinitionRegistry, name: &str, file: &str) -> Option<String> {
    for label in ["Function", "Method"] {
        if let Some(def) = registry.by_name(label, name).into_iter().find(|d| d.file_path == file) {
            return Some(def.canonical_id.clone());
        }
    }
    None
}

fn unique_callable(registry: &DefinitionRegistry, name: &str) -> Option<String> {
    let mut matches = registry.by_name("Function", name);
    matches.extend(registry.by_name("Method", name));
    match matches.as_slice() {
        [only] => Some(only.canonical_id.clone()),
        _ => None,
    }
}

fn method_in_file(registry: &DefinitionRegistry, name: &str, file: &str) -> Option<String> {
    registry
        .by_name("Method", name)
        .into_iter()
        .find(|d| d.file_path == file)
        .map(|d| d.canonical_id.clone())
}

fn unique_method(registry: &DefinitionRegistry, name: &str) -> Option<String> {
    match registry.by_name("Method", name).as_slice() {
        [only] => Some(only.canonical_id.clone()),
        _ => None,
    }
}

/// Resolve a bare-name reference by walking the scope chain of the source
/// node (enclosing function → class → file). Unresolved references fall
/// back to the module-scope canonical and pend.
fn resolve_reference_target(
    name: &str,
    source: Option<&NodeStub>,
    registry: &DefinitionRegistry,
    parent_of: &HashMap<String, String>,
    nodes: &[NodeStub],
    node_by_gid: &HashMap<String, usize>,
) -> String {
    let Some(source) = source else {
        return name.to_string();
    };
    if name.contains("::") {
        // Already canonical-shaped; nothing to scope-resolve.
        return name.to_string();
    }

    let mut scope = Some(source.canonical_id.clone());
    let mut hops = 0;
    while let Some(current) = scope {
        let candidate = format!("{current}::{name}");
        if registry.contains(&candidate) {
            return candidate;
        }
        hops += 1;
        if hops > 8 {
            break;
        }
        scope = parent_of
            .get(&current)
            .and_then(|gid| node_by_gid.get(gid))
            .map(|idx| nodes[*idx].canonical_id.clone());
    }

    match registry.file_canonical(&source.file_path) {
        Some(file_canonical) => format!("{file_canonical}::{name}"),
        None => {
            let basename = source.file_path.rsplit('/').next().unwrap_or("");
            format!("{}::File::{}::{}", source.file_path, basename, name)
        }
    }
}

/// Resolve an annotated-type use (`python::Class::<name>`) to a type
/// definition when one is in scope.
fn resolve_type_target(
    target: &str,
    source: Option<&NodeStub>,
    registry: &DefinitionRegistry,
) -> String {
    if registry.contains(target) || !is_language_namespace(target) {
        return target.to_string();
    }
    let segments: Vec<&str> = target.split("::").collect();
    let [_, "Class", name] = segments.as_slice() else {
        return target.to_string();
    };
    let source_file = source.map(|n| n.file_path.as_str()).unwrap_or("");
    registry
        .named_definition(&["Class", "Struct", "Enum", "Interface"], name, source_file)
        .map(|d| d.canonical_id.clone())
        .unwrap_or_else(|| target.to_string())
}

/// Resolve an IMPORTS target to the imported file's canonical: a known
/// File node when the module was analyzed in this batch, a predicted File
/// canonical otherwise, or an External module for the standard library.
fn resolve_import_target(
    rel: &codeloom_common::RelationshipStub,
    language: &str,
    source: Option<&NodeStub>,
    registry: &DefinitionRegistry,
) -> String {
    let module = rel
        .properties
        .get("source_module")
        .and_then(|v| v.as_str())
        .unwrap_or(&rel.target_canonical_id)
        .trim_start_matches('.')
        .to_string();
    let level = rel.properties.get("level").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
    let imported_name = rel.properties.get("imported_name").and_then(|v| v.as_str());

    // `from . import utils` carries an empty module; the imported name is
    // the module.
    let module = if module.is_empty() {
        match imported_name {
            Some(name) => name.to_string(),
            None => return rel.target_canonical_id.clone(),
        }
    } else {
        module
    };

    if is_stdlib_module(&module) {
        return format!("{language}::Module::{module}");
    }

    let source_file = source.map(|n| n.file_path.as_str()).unwrap_or("");
    match predict_module_path(source_file, &module, level) {
        Some(path) => match registry.file_canonical(&path) {
            Some(canonical) => canonical.to_string(),
            None => {
                let basename = path.rsplit('/').next().unwrap_or(&path);
                format!("{path}::File::{basename}")
            }
        },
        None => rel.target_canonical_id.clone(),
    }
}
