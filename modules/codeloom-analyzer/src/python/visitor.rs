use std::collections::HashSet;

use tree_sitter::{Node, Parser};

use codeloom_common::{AnalyzerResult, NodeStub, Properties, RelationshipStub};
use codeloom_identity::{normalize_path, strip_signature, EntityKind, IdRequest};

use crate::hints::parse_hint_comments;
use crate::idcache::CachedIdentity;
use crate::AnalyzerError;

use super::patterns;

/// Parse one Python file into node and relationship stubs.
///
/// Syntax errors produce a result with `error` set and empty lists; the
/// job itself still succeeds and the file stays un-analyzed until it is
/// touched again.
pub fn analyze_source(file_path: &str, source: &str) -> Result<AnalyzerResult, AnalyzerError> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| AnalyzerError::Parser(e.to_string()))?;

    let Some(tree) = parser.parse(source, None) else {
        return Ok(AnalyzerResult::failed(
            file_path,
            "python",
            "parser produced no tree",
        ));
    };
    if tree.root_node().has_error() {
        return Ok(AnalyzerResult::failed(
            file_path,
            "python",
            format!("syntax error in {file_path}"),
        ));
    }

    let mut visitor = Visitor::new(file_path, source)?;
    visitor.visit_module(tree.root_node())?;

    let mut result = AnalyzerResult::empty(file_path, "python");
    result
        .relationships_upserted
        .extend(parse_hint_comments(source, &visitor.file_gid, "#"));
    result.nodes_upserted = visitor.nodes;
    result.relationships_upserted.extend(visitor.relationships);
    Ok(result)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ScopeKind {
    File,
    Class,
    Function,
}

struct Scope {
    gid: String,
    canonical_id: String,
    kind: ScopeKind,
}

struct Visitor<'s> {
    source: &'s str,
    /// Normalized repo-relative path used in every identity request.
    path: String,
    ids: CachedIdentity,
    nodes: Vec<NodeStub>,
    relationships: Vec<RelationshipStub>,
    scopes: Vec<Scope>,
    file_gid: String,
    file_canonical: String,
    seen_references: HashSet<(String, String)>,
}

impl<'s> Visitor<'s> {
    fn new(file_path: &str, source: &'s str) -> Result<Self, AnalyzerError> {
        Ok(Self {
            source,
            path: normalize_path(file_path),
            ids: CachedIdentity::default(),
            nodes: Vec::new(),
            relationships: Vec::new(),
            scopes: Vec::new(),
            file_gid: String::new(),
            file_canonical: String::new(),
            seen_references: HashSet::new(),
        })
    }

    fn text(&self, node: Node) -> &'s str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    fn line(node: Node) -> u64 {
        node.start_position().row as u64 + 1
    }

    fn scope(&self) -> &Scope {
        self.scopes.last().expect("scope stack is never empty after visit_module")
    }

    fn push_node(
        &mut self,
        label: &str,
        name: &str,
        canonical_id: &str,
        gid: &str,
        properties: Properties,
    ) {
        self.nodes.push(NodeStub {
            gid: gid.to_string(),
            canonical_id: canonical_id.to_string(),
            name: name.to_string(),
            file_path: self.path.clone(),
            language: "python".to_string(),
            labels: vec![label.to_string()],
            properties,
        });
    }

    fn push_rel(
        &mut self,
        source_gid: &str,
        target: &str,
        rel_type: &str,
        properties: Properties,
    ) {
        self.relationships.push(RelationshipStub {
            source_gid: source_gid.to_string(),
            target_canonical_id: target.to_string(),
            rel_type: rel_type.to_string(),
            properties,
        });
    }

    fn contains(&mut self, child_canonical: &str) {
        let source = self.scope().gid.clone();
        self.push_rel(&source, child_canonical, "CONTAINS", Properties::new());
    }

    // --- visitors ---

    fn visit_module(&mut self, root: Node) -> Result<(), AnalyzerError> {
        let basename = self.path.rsplit('/').next().unwrap_or(&self.path).to_string();
        let id = self
            .ids
            .generate(&IdRequest::new(&self.path, EntityKind::File, &basename))?;
        self.file_gid = id.gid.clone();
        self.file_canonical = id.canonical_id.clone();

        let mut props = Properties::new();
        props.insert("start_line".to_string(), 1u64.into());
        props.insert(
            "end_line".to_string(),
            (root.end_position().row as u64 + 1).into(),
        );
        self.push_node("File", &basename, &id.canonical_id, &id.gid, props);

        self.scopes.push(Scope {
            gid: id.gid,
            canonical_id: id.canonical_id,
            kind: ScopeKind::File,
        });
        self.walk_children(root)?;
        self.scopes.pop();
        Ok(())
    }

    fn walk_children(&mut self, node: Node) -> Result<(), AnalyzerError> {
        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        for child in children {
            self.walk(child)?;
        }
        Ok(())
    }

    fn walk(&mut self, node: Node) -> Result<(), AnalyzerError> {
        match node.kind() {
            "decorated_definition" => self.handle_decorated(node),
            "class_definition" => self.handle_class(node, &[]),
            "function_definition" => self.handle_function(node, &[]),
            "import_statement" => self.handle_import(node),
            "import_from_statement" => self.handle_import_from(node),
            "assignment" => self.handle_assignment(node),
            "call" => self.handle_call(node),
            "identifier" => {
                self.maybe_reference(node);
                Ok(())
            }
            _ => self.walk_children(node),
        }
    }

    fn handle_decorated(&mut self, node: Node) -> Result<(), AnalyzerError> {
        let mut cursor = node.walk();
        let decorators: Vec<String> = node
            .children(&mut cursor)
            .filter(|c| c.kind() == "decorator")
            .map(|c| self.text(c).to_string())
            .collect();
        drop(cursor);

        let Some(definition) = node.child_by_field_name("definition") else {
            return self.walk_children(node);
        };
        match definition.kind() {
            "class_definition" => self.handle_class(definition, &decorators),
            "function_definition" => self.handle_function(definition, &decorators),
            _ => self.walk_children(definition),
        }
    }

    fn handle_class(&mut self, node: Node, decorators: &[String]) -> Result<(), AnalyzerError> {
        let Some(name_node) = node.child_by_field_name("name") else {
            return Ok(());
        };
        let name = self.text(name_node).to_string();
        let parent_canonical = self.scope().canonical_id.clone();

        let id = self.ids.generate(
            &IdRequest::new(&self.path, EntityKind::Class, &name).with_parent(&parent_canonical),
        )?;

        let bases: Vec<String> = node
            .child_by_field_name("superclasses")
            .map(|sup| {
                let mut cursor = sup.walk();
                sup.named_children(&mut cursor)
                    .filter(|c| matches!(c.kind(), "identifier" | "attribute"))
                    .map(|c| self.text(c).to_string())
                    .collect()
            })
            .unwrap_or_default();

        let mut props = Properties::new();
        props.insert("start_line".to_string(), Self::line(node).into());
        props.insert(
            "end_line".to_string(),
            (node.end_position().row as u64 + 1).into(),
        );
        if !bases.is_empty() {
            props.insert("bases".to_string(), bases.clone().into());
        }
        if !decorators.is_empty() {
            props.insert("decorators".to_string(), decorators.to_vec().into());
        }
        self.push_node("Class", &name, &id.canonical_id, &id.gid, props);
        self.contains(&id.canonical_id);

        for base in &bases {
            let simple = base.rsplit('.').next().unwrap_or(base);
            let gid = id.gid.clone();
            let mut rel_props = Properties::new();
            rel_props.insert("base".to_string(), base.clone().into());
            self.push_rel(
                &gid,
                &format!("python::Class::{simple}"),
                "INHERITS_FROM",
                rel_props,
            );
        }

        self.scopes.push(Scope {
            gid: id.gid,
            canonical_id: id.canonical_id,
            kind: ScopeKind::Class,
        });
        if let Some(body) = node.child_by_field_name("body") {
            self.walk_children(body)?;
        }
        self.scopes.pop();
        Ok(())
    }

    fn handle_function(&mut self, node: Node, decorators: &[String]) -> Result<(), AnalyzerError> {
        let Some(name_node) = node.child_by_field_name("name") else {
            return Ok(());
        };
        let name = self.text(name_node).to_string();
        let is_method = self.scope().kind == ScopeKind::Class;
        let parent_canonical = self.scope().canonical_id.clone();

        let (param_names, param_types) = self.parse_parameters(node.child_by_field_name("parameters"));
        let kind = if is_method {
            EntityKind::Method
        } else {
            EntityKind::Function
        };
        let id = self.ids.generate(
            &IdRequest::new(&self.path, kind, &name)
                .with_parent(&parent_canonical)
                .with_params(param_types.clone()),
        )?;

        let return_type = node
            .child_by_field_name("return_type")
            .map(|r| self.text(r).to_string());
        let is_async = node
            .child(0)
            .map(|c| c.kind() == "async")
            .unwrap_or(false);

        let mut signature = format!("({})", param_names.join(", "));
        if let Some(ret) = &return_type {
            signature.push_str(&format!(" -> {ret}"));
        }

        let mut props = Properties::new();
        props.insert("start_line".to_string(), Self::line(node).into());
        props.insert(
            "end_line".to_string(),
            (node.end_position().row as u64 + 1).into(),
        );
        props.insert("signature".to_string(), signature.into());
        props.insert("parameters".to_string(), param_names.clone().into());
        props.insert("is_async".to_string(), is_async.into());
        props.insert("is_method".to_string(), is_method.into());
        if let Some(ret) = &return_type {
            props.insert("return_type".to_string(), ret.clone().into());
        }
        if !decorators.is_empty() {
            props.insert("decorators".to_string(), decorators.to_vec().into());
        }
        if let Some(simple) = strip_signature(&id.canonical_id) {
            props.insert("simple_canonical_id".to_string(), simple.into());
        }

        let label = if is_method { "Method" } else { "Function" };
        self.push_node(label, &name, &id.canonical_id, &id.gid, props);
        self.contains(&id.canonical_id);

        // Parameters are variables scoped to the function; body references
        // to them resolve against these nodes.
        for (position, param_name) in param_names.iter().enumerate() {
            if param_name == "self" || param_name == "cls" || param_name.starts_with('*') {
                continue;
            }
            let param_id = self.ids.generate(
                &IdRequest::new(&self.path, EntityKind::Variable, param_name)
                    .with_parent(&id.canonical_id),
            )?;
            let mut param_props = Properties::new();
            param_props.insert("start_line".to_string(), Self::line(node).into());
            param_props.insert("is_parameter".to_string(), true.into());
            if param_types[position] != "Any" {
                param_props.insert(
                    "type_hint".to_string(),
                    param_types[position].clone().into(),
                );
            }
            self.push_node(
                "Variable",
                param_name,
                &param_id.canonical_id,
                &param_id.gid,
                param_props,
            );
            self.push_rel(
                &id.gid.clone(),
                &param_id.canonical_id,
                "CONTAINS",
                Properties::new(),
            );
            let mut has_param_props = Properties::new();
            has_param_props.insert("position".to_string(), (position as u64).into());
            self.push_rel(
                &id.gid.clone(),
                &param_id.canonical_id,
                "HAS_PARAMETER",
                has_param_props,
            );
        }

        // Route decorators declare an HTTP endpoint handled by this
        // function.
        for decorator in decorators {
            if let Some((method, route)) = patterns::route_decorator(decorator) {
                self.emit_endpoint(&method, &route, &id.canonical_id, node)?;
            }
        }

        // Annotated parameters and the return annotation are type uses.
        for type_name in param_types.iter().chain(return_type.iter()) {
            if type_name != "Any" && is_plain_identifier(type_name) {
                let mut rel_props = Properties::new();
                rel_props.insert("type_name".to_string(), type_name.clone().into());
                self.push_rel(
                    &id.gid.clone(),
                    &format!("python::Class::{type_name}"),
                    "USES_TYPE",
                    rel_props,
                );
            }
        }

        self.scopes.push(Scope {
            gid: id.gid,
            canonical_id: id.canonical_id,
            kind: ScopeKind::Function,
        });
        if let Some(body) = node.child_by_field_name("body") {
            self.walk_children(body)?;
        }
        self.scopes.pop();
        Ok(())
    }

    fn emit_endpoint(
        &mut self,
        method: &str,
        route: &str,
        handler_canonical: &str,
        node: Node,
    ) -> Result<(), AnalyzerError> {
        let id = self
            .ids
            .generate(&IdRequest::new(&self.path, EntityKind::ApiEndpoint, route))?;
        let mut props = Properties::new();
        props.insert("path".to_string(), route.to_string().into());
        props.insert("method".to_string(), method.to_string().into());
        props.insert("start_line".to_string(), Self::line(node).into());
        self.push_node("ApiEndpoint", route, &id.canonical_id, &id.gid, props);

        let file_gid = self.file_gid.clone();
        self.push_rel(&file_gid, &id.canonical_id, "CONTAINS", Properties::new());

        let mut rel_props = Properties::new();
        rel_props.insert("role".to_string(), "handler".to_string().into());
        self.push_rel(&id.gid.clone(), handler_canonical, "REFERENCES", rel_props);
        Ok(())
    }

    fn parse_parameters(&self, params: Option<Node>) -> (Vec<String>, Vec<String>) {
        let mut names = Vec::new();
        let mut types = Vec::new();
        let Some(params) = params else {
            return (names, types);
        };
        let mut cursor = params.walk();
        for child in params.named_children(&mut cursor) {
            match child.kind() {
                "identifier" => {
                    names.push(self.text(child).to_string());
                    types.push("Any".to_string());
                }
                "typed_parameter" => {
                    let name = child
                        .named_child(0)
                        .map(|n| self.text(n).to_string())
                        .unwrap_or_default();
                    let type_hint = child
                        .child_by_field_name("type")
                        .map(|t| self.text(t).to_string())
                        .unwrap_or_else(|| "Any".to_string());
                    names.push(name);
                    types.push(type_hint);
                }
                "default_parameter" => {
                    let name = child
                        .child_by_field_name("name")
                        .map(|n| self.text(n).to_string())
                        .unwrap_or_default();
                    names.push(name);
                    types.push("Any".to_string());
                }
                "typed_default_parameter" => {
                    let name = child
                        .child_by_field_name("name")
                        .map(|n| self.text(n).to_string())
                        .unwrap_or_default();
                    let type_hint = child
                        .child_by_field_name("type")
                        .map(|t| self.text(t).to_string())
                        .unwrap_or_else(|| "Any".to_string());
                    names.push(name);
                    types.push(type_hint);
                }
                "list_splat_pattern" | "dictionary_splat_pattern" => {
                    names.push(self.text(child).to_string());
                    types.push("Any".to_string());
                }
                _ => {}
            }
        }
        (names, types)
    }

    fn handle_assignment(&mut self, node: Node) -> Result<(), AnalyzerError> {
        let left = node.child_by_field_name("left");
        let right = node.child_by_field_name("right");
        let type_node = node.child_by_field_name("type");

        let mut targets: Vec<(Node, bool)> = Vec::new();
        if let Some(left) = left {
            match left.kind() {
                "identifier" => targets.push((left, false)),
                "attribute" => targets.push((left, true)),
                "pattern_list" | "tuple_pattern" => {
                    let mut cursor = left.walk();
                    for item in left.named_children(&mut cursor) {
                        if item.kind() == "identifier" {
                            targets.push((item, false));
                        }
                    }
                }
                _ => {}
            }
        }

        let value_snippet = right.map(|r| truncate(self.text(r), 100));
        let type_hint = type_node.map(|t| self.text(t).to_string());
        let scope_canonical = self.scope().canonical_id.clone();
        let scope_gid = self.scope().gid.clone();

        for (target, is_attribute) in targets {
            let name = self.text(target).to_string();
            if name.is_empty() {
                continue;
            }
            let kind = if is_attribute {
                EntityKind::Attribute
            } else {
                EntityKind::Variable
            };
            let id = self.ids.generate(
                &IdRequest::new(&self.path, kind, &name).with_parent(&scope_canonical),
            )?;

            let mut props = Properties::new();
            props.insert("start_line".to_string(), Self::line(target).into());
            props.insert("is_attribute".to_string(), is_attribute.into());
            props.insert(
                "assignment_type".to_string(),
                if type_hint.is_some() { "annotated" } else { "simple" }
                    .to_string()
                    .into(),
            );
            if let Some(snippet) = &value_snippet {
                props.insert("value_snippet".to_string(), snippet.clone().into());
            }
            if let Some(hint) = &type_hint {
                props.insert("type_hint".to_string(), hint.clone().into());
            }
            let label = if is_attribute { "Attribute" } else { "Variable" };
            self.push_node(label, &name, &id.canonical_id, &id.gid, props);
            self.contains(&id.canonical_id);
        }

        if let Some(hint) = &type_hint {
            if is_plain_identifier(hint) {
                let mut rel_props = Properties::new();
                rel_props.insert("type_name".to_string(), hint.clone().into());
                self.push_rel(
                    &scope_gid,
                    &format!("python::Class::{hint}"),
                    "USES_TYPE",
                    rel_props,
                );
            }
        }

        if let Some(right) = right {
            self.walk(right)?;
        }
        Ok(())
    }

    fn handle_call(&mut self, node: Node) -> Result<(), AnalyzerError> {
        let Some(func) = node.child_by_field_name("function") else {
            return self.walk_children(node);
        };
        let call_text = self.text(func).to_string();
        let line = Self::line(node);
        let scope_gid = self.scope().gid.clone();
        let scope_canonical = self.scope().canonical_id.clone();

        let args_count = node
            .child_by_field_name("arguments")
            .map(|a| a.named_child_count())
            .unwrap_or(0);

        let heuristic_target = match func.kind() {
            "identifier" => Some((format!("python::Function::{call_text}"), false)),
            "attribute" => {
                let attr = func
                    .child_by_field_name("attribute")
                    .map(|a| self.text(a).to_string())
                    .unwrap_or_default();
                let object = func.child_by_field_name("object");
                match object.map(|o| o.kind()) {
                    Some("identifier") => {
                        let obj = self.text(object.expect("object present")).to_string();
                        Some((format!("python::Object::{obj}::Method::{attr}"), true))
                    }
                    _ if !attr.is_empty() => Some((format!("python::Method::{attr}"), true)),
                    _ => None,
                }
            }
            _ => None,
        };

        if patterns::is_api_call(&call_text) {
            let url = self.first_string_argument(node);
            let name = format!("{call_text}@L{line}");
            let id = self.ids.generate(
                &IdRequest::new(&self.path, EntityKind::ApiCall, &name)
                    .with_parent(&scope_canonical),
            )?;
            let mut props = Properties::new();
            props.insert("call_target".to_string(), call_text.clone().into());
            props.insert("start_line".to_string(), line.into());
            if let Some(url) = &url {
                props.insert("url".to_string(), truncate(url, 200).into());
            }
            self.push_node("ApiCall", &name, &id.canonical_id, &id.gid, props);
            self.contains(&id.canonical_id);

            let mut rel_props = Properties::new();
            if let Some(url) = &url {
                rel_props.insert("url".to_string(), truncate(url, 200).into());
            }
            self.push_rel(&scope_gid, &id.canonical_id, "CALLS_API", rel_props);
        } else if patterns::is_db_call(&call_text) {
            let query = self.first_string_argument(node);
            let name = format!("{call_text}@L{line}");
            let id = self.ids.generate(
                &IdRequest::new(&self.path, EntityKind::DatabaseQuery, &name)
                    .with_parent(&scope_canonical),
            )?;
            let mut props = Properties::new();
            props.insert("call_target".to_string(), call_text.clone().into());
            props.insert("start_line".to_string(), line.into());
            if let Some(query) = &query {
                props.insert("query".to_string(), truncate(query, 500).into());
            }
            self.push_node("DatabaseQuery", &name, &id.canonical_id, &id.gid, props);
            self.contains(&id.canonical_id);

            let mut rel_props = Properties::new();
            if let Some(query) = &query {
                rel_props.insert("query".to_string(), truncate(query, 500).into());
            }
            self.push_rel(&scope_gid, &id.canonical_id, "QUERIES_DB", rel_props);
        } else if let Some((target, is_method_call)) = heuristic_target {
            let mut props = Properties::new();
            props.insert("call_target_string".to_string(), call_text.clone().into());
            props.insert("args_count".to_string(), (args_count as u64).into());
            props.insert("is_method_call".to_string(), is_method_call.into());
            props.insert("start_line".to_string(), line.into());
            self.push_rel(&scope_gid, &target, "CALLS", props);
        }

        self.walk(func)?;
        if let Some(args) = node.child_by_field_name("arguments") {
            self.walk_children(args)?;
        }
        Ok(())
    }

    fn first_string_argument(&self, call: Node) -> Option<String> {
        let args = call.child_by_field_name("arguments")?;
        let mut cursor = args.walk();
        for child in args.named_children(&mut cursor) {
            let string_node = match child.kind() {
                "string" => Some(child),
                "keyword_argument" => child
                    .child_by_field_name("value")
                    .filter(|v| v.kind() == "string"),
                _ => None,
            };
            if let Some(s) = string_node {
                return Some(unquote(self.text(s)));
            }
        }
        None
    }

    fn handle_import(&mut self, node: Node) -> Result<(), AnalyzerError> {
        let mut cursor = node.walk();
        let children: Vec<Node> = node.named_children(&mut cursor).collect();
        drop(cursor);
        for child in children {
            let (module, alias) = match child.kind() {
                "dotted_name" => (self.text(child).to_string(), None),
                "aliased_import" => {
                    let module = child
                        .child_by_field_name("name")
                        .map(|n| self.text(n).to_string())
                        .unwrap_or_default();
                    let alias = child
                        .child_by_field_name("alias")
                        .map(|a| self.text(a).to_string());
                    (module, alias)
                }
                _ => continue,
            };
            if module.is_empty() {
                continue;
            }
            self.emit_import(node, &module, 0, None, alias.as_deref())?;
        }
        Ok(())
    }

    fn handle_import_from(&mut self, node: Node) -> Result<(), AnalyzerError> {
        let Some(module_node) = node.child_by_field_name("module_name") else {
            return Ok(());
        };
        let (module, level) = match module_node.kind() {
            "dotted_name" => (self.text(module_node).to_string(), 0u32),
            "relative_import" => {
                let raw = self.text(module_node);
                let dots = raw.chars().take_while(|c| *c == '.').count() as u32;
                (raw.trim_start_matches('.').to_string(), dots)
            }
            _ => (self.text(module_node).to_string(), 0),
        };

        let mut cursor = node.walk();
        let names: Vec<Node> = node
            .named_children(&mut cursor)
            .filter(|c| c.id() != module_node.id())
            .collect();
        drop(cursor);

        for child in names {
            let (imported, alias) = match child.kind() {
                "dotted_name" | "identifier" => (self.text(child).to_string(), None),
                "aliased_import" => {
                    let imported = child
                        .child_by_field_name("name")
                        .map(|n| self.text(n).to_string())
                        .unwrap_or_default();
                    let alias = child
                        .child_by_field_name("alias")
                        .map(|a| self.text(a).to_string());
                    (imported, alias)
                }
                // `from x import *` gives the resolver nothing to bind.
                "wildcard_import" => continue,
                _ => continue,
            };
            if imported.is_empty() {
                continue;
            }
            self.emit_import(node, &module, level, Some(&imported), alias.as_deref())?;
        }
        Ok(())
    }

    fn emit_import(
        &mut self,
        node: Node,
        module: &str,
        level: u32,
        imported_name: Option<&str>,
        alias: Option<&str>,
    ) -> Result<(), AnalyzerError> {
        let display_name = imported_name.unwrap_or(module);
        let source_label = format!("{}{}", ".".repeat(level as usize), module);
        let id = self.ids.generate(
            &IdRequest::new(&self.path, EntityKind::Import, display_name)
                .with_parent(&self.file_canonical)
                .with_import_source(&source_label),
        )?;

        let mut props = Properties::new();
        props.insert("source_module".to_string(), module.to_string().into());
        props.insert("level".to_string(), (level as u64).into());
        props.insert("start_line".to_string(), Self::line(node).into());
        props.insert(
            "import_type".to_string(),
            if imported_name.is_some() { "from" } else { "module" }
                .to_string()
                .into(),
        );
        if let Some(imported) = imported_name {
            props.insert("imported_name".to_string(), imported.to_string().into());
        }
        if let Some(alias) = alias {
            props.insert("alias".to_string(), alias.to_string().into());
        }

        self.push_node("Import", display_name, &id.canonical_id, &id.gid, props.clone());

        let target = if module.is_empty() {
            display_name.to_string()
        } else {
            module.to_string()
        };
        let file_gid = self.file_gid.clone();
        props.remove("import_type");
        self.push_rel(&file_gid, &target, "IMPORTS", props);
        Ok(())
    }

    fn maybe_reference(&mut self, node: Node) {
        let name = self.text(node);
        if name.is_empty() || name == "self" || name == "cls" {
            return;
        }
        let Some(parent) = node.parent() else {
            return;
        };

        let is_load = match parent.kind() {
            "assignment" => !is_field(parent, "left", node),
            "attribute" => is_field(parent, "object", node),
            // The bare callee name is covered by the CALLS stub.
            "call" => false,
            "keyword_argument" => !is_field(parent, "name", node),
            "parameters" | "typed_parameter" | "default_parameter" | "typed_default_parameter"
            | "lambda_parameters" => false,
            "function_definition" | "class_definition" => false,
            "import_statement" | "import_from_statement" | "aliased_import" | "dotted_name"
            | "relative_import" => false,
            "decorator" | "type" => false,
            "for_statement" => !is_field(parent, "left", node),
            _ => true,
        };
        if !is_load {
            return;
        }

        let scope_gid = self.scope().gid.clone();
        if !self
            .seen_references
            .insert((scope_gid.clone(), name.to_string()))
        {
            return;
        }
        let mut props = Properties::new();
        props.insert("variable_name".to_string(), name.to_string().into());
        props.insert("start_line".to_string(), Self::line(node).into());
        self.push_rel(&scope_gid, name, "REFERENCES", props);
    }
}

fn is_field(parent: Node, field: &str, node: Node) -> bool {
    parent
        .child_by_field_name(field)
        .map(|c| c.id() == node.id())
        .unwrap_or(false)
}

fn is_plain_identifier(s: &str) -> bool {
    !s.is_empty()
        && s.chars().next().map(|c| c.is_ascii_alphabetic() || c == '_').unwrap_or(false)
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

fn unquote(raw: &str) -> String {
    raw.trim_matches(|c| c == '"' || c == '\'').to_string()
}
