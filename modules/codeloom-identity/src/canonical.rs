use sha2::{Digest, Sha256};

use crate::{EntityKind, GeneratedId, IdRequest, IdentityError};

/// Normalize a repository-relative path: forward slashes, no `./` prefix,
/// lower-case.
pub fn normalize_path(path: &str) -> String {
    let mut normalized = path.replace('\\', "/");
    if let Some(stripped) = normalized.strip_prefix("./") {
        normalized = stripped.to_string();
    }
    normalized.to_lowercase()
}

/// GID for a canonical id: `<lang>:<sha256 hex>`.
pub fn gid_for(language: &str, canonical_id: &str) -> String {
    let digest = Sha256::digest(canonical_id.as_bytes());
    format!("{}:{}", language, hex::encode(digest))
}

/// Strip the parameter signature from the last segment of a canonical id:
/// `a.py::Function::f(Any)` → `a.py::Function::f`. Returns `None` when
/// there is nothing to strip.
pub fn strip_signature(canonical_id: &str) -> Option<String> {
    let open = canonical_id.rfind('(')?;
    if !canonical_id.ends_with(')') {
        return None;
    }
    // The signature must sit in the last `::` segment.
    if canonical_id[open..].contains("::") {
        return None;
    }
    Some(canonical_id[..open].to_string())
}

pub(crate) fn generate(request: &IdRequest) -> Result<GeneratedId, IdentityError> {
    if request.file_path.trim().is_empty() {
        return Err(IdentityError::InvalidArgument("file_path is empty".into()));
    }
    if request.name.trim().is_empty() {
        return Err(IdentityError::InvalidArgument("name is empty".into()));
    }

    let path = normalize_path(&request.file_path);
    let language = request
        .language_hint
        .clone()
        .unwrap_or_else(|| language_from_path(&path).to_string());

    let canonical_id = build_canonical(request, &path)?;
    let gid = gid_for(&language, &canonical_id);
    Ok(GeneratedId { canonical_id, gid })
}

fn build_canonical(request: &IdRequest, path: &str) -> Result<String, IdentityError> {
    let name = request.name.trim();
    let parent = request
        .parent_canonical_id
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty());

    let canonical = match request.entity_type {
        EntityKind::File | EntityKind::Module => {
            let basename = path.rsplit('/').next().unwrap_or(path);
            format!("{path}::{}::{basename}", request.entity_type.as_str())
        }
        EntityKind::Class
        | EntityKind::Interface
        | EntityKind::Enum
        | EntityKind::Struct
        | EntityKind::Table
        | EntityKind::ApiEndpoint
        | EntityKind::HtmlElement
        | EntityKind::EnvironmentVariable => {
            let scope = file_level_scope(parent, path);
            format!("{scope}::{}::{name}", request.entity_type.as_str())
        }
        EntityKind::Function => {
            let scope = file_level_scope(parent, path);
            format!("{scope}::Function::{name}({})", signature(&request.param_types))
        }
        EntityKind::Method => {
            let scope = parent.unwrap_or(path);
            format!("{scope}::Method::{name}({})", signature(&request.param_types))
        }
        EntityKind::Variable | EntityKind::Attribute => {
            // Module-scope variables hang off the File canonical itself.
            let scope = parent.unwrap_or(path);
            format!("{scope}::{name}")
        }
        EntityKind::Column | EntityKind::ApiCall | EntityKind::DatabaseQuery => {
            let scope = parent.unwrap_or(path);
            format!("{scope}::{}::{name}", request.entity_type.as_str())
        }
        EntityKind::Import => {
            let file_canonical = match parent {
                Some(p) => p.to_string(),
                None => {
                    let basename = path.rsplit('/').next().unwrap_or(path);
                    format!("{path}::File::{basename}")
                }
            };
            let source = request
                .import_source
                .as_deref()
                .unwrap_or(name)
                .replace(['"', '\''], "");
            format!("{file_canonical}::IMPORT:{name}@{source}")
        }
    };
    Ok(canonical)
}

/// Scope for file-level definitions. A File canonical passed as the parent
/// is collapsed to its bare path so children read
/// `module.py::Function::f(…)` rather than
/// `module.py::File::module.py::Function::f(…)`.
fn file_level_scope<'a>(parent: Option<&'a str>, path: &'a str) -> &'a str {
    match parent {
        None => path,
        Some(p) => match p.find("::File::") {
            Some(idx) => &p[..idx],
            None => p,
        },
    }
}

fn signature(param_types: &[String]) -> String {
    param_types
        .iter()
        .map(|t| {
            let t = t.trim();
            if t.is_empty() {
                "Any"
            } else {
                t
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn language_from_path(path: &str) -> &'static str {
    match path.rsplit('.').next() {
        Some("py") => "python",
        Some("js") => "javascript",
        Some("ts") => "typescript",
        Some("java") => "java",
        Some("go") => "go",
        Some("rs") => "rust",
        Some("cs") => "csharp",
        Some("sql") => "sql",
        Some("html") | Some("htm") => "html",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{IdentityProvider, IdentityService};
    use pretty_assertions::assert_eq;

    fn generate(request: &IdRequest) -> GeneratedId {
        IdentityService.generate_id(request).unwrap()
    }

    #[test]
    fn path_normalization() {
        assert_eq!(normalize_path("./src\\Utils/Helpers.py"), "src/utils/helpers.py");
        assert_eq!(normalize_path("Main.PY"), "main.py");
    }

    #[test]
    fn file_canonical_and_gid() {
        let id = generate(&IdRequest::new("./src/Module.py", EntityKind::File, "Module.py"));
        assert_eq!(id.canonical_id, "src/module.py::File::module.py");
        assert!(id.gid.starts_with("python:"));
        assert_eq!(id.gid.len(), "python:".len() + 64);
    }

    #[test]
    fn function_signature_defaults_to_any() {
        let file = generate(&IdRequest::new("module.py", EntityKind::File, "module.py"));
        let id = generate(
            &IdRequest::new("module.py", EntityKind::Function, "utility_function")
                .with_parent(file.canonical_id)
                .with_params(vec![String::new()]),
        );
        assert_eq!(id.canonical_id, "module.py::Function::utility_function(Any)");
    }

    #[test]
    fn zero_parameter_function() {
        let id = generate(&IdRequest::new("module.py", EntityKind::Function, "run"));
        assert_eq!(id.canonical_id, "module.py::Function::run()");
    }

    #[test]
    fn method_hangs_off_the_class_canonical() {
        let class = generate(
            &IdRequest::new("src/svc.py", EntityKind::Class, "DataService")
                .with_parent("src/svc.py::File::svc.py"),
        );
        assert_eq!(class.canonical_id, "src/svc.py::Class::DataService");

        let method = generate(
            &IdRequest::new("src/svc.py", EntityKind::Method, "fetch")
                .with_parent(class.canonical_id.clone())
                .with_params(vec!["Any".into(), "int".into()]),
        );
        assert_eq!(
            method.canonical_id,
            "src/svc.py::Class::DataService::Method::fetch(Any,int)"
        );
    }

    #[test]
    fn module_scope_variable_uses_the_file_canonical() {
        let id = generate(
            &IdRequest::new("a.py", EntityKind::Variable, "LIMIT")
                .with_parent("a.py::File::a.py"),
        );
        assert_eq!(id.canonical_id, "a.py::File::a.py::LIMIT");
    }

    #[test]
    fn local_variable_uses_the_function_canonical() {
        let id = generate(
            &IdRequest::new("a.py", EntityKind::Variable, "total")
                .with_parent("a.py::Function::sum(Any)"),
        );
        assert_eq!(id.canonical_id, "a.py::Function::sum(Any)::total");
    }

    #[test]
    fn import_canonical() {
        let id = generate(
            &IdRequest::new("main.py", EntityKind::Import, "utility_function")
                .with_parent("main.py::File::main.py")
                .with_import_source("module"),
        );
        assert_eq!(
            id.canonical_id,
            "main.py::File::main.py::IMPORT:utility_function@module"
        );
    }

    #[test]
    fn table_and_column() {
        let table = generate(&IdRequest::new("schema.sql", EntityKind::Table, "users"));
        assert_eq!(table.canonical_id, "schema.sql::Table::users");
        assert!(table.gid.starts_with("sql:"));

        let column = generate(
            &IdRequest::new("schema.sql", EntityKind::Column, "name")
                .with_parent(table.canonical_id),
        );
        assert_eq!(column.canonical_id, "schema.sql::Table::users::Column::name");
    }

    #[test]
    fn generation_is_deterministic() {
        let request = IdRequest::new("pkg/app.py", EntityKind::Function, "handler")
            .with_params(vec!["Request".into()]);
        assert_eq!(generate(&request), generate(&request));
    }

    #[test]
    fn empty_inputs_are_invalid() {
        let service = IdentityService;
        assert!(matches!(
            service.generate_id(&IdRequest::new("", EntityKind::File, "a.py")),
            Err(IdentityError::InvalidArgument(_))
        ));
        assert!(matches!(
            service.generate_id(&IdRequest::new("a.py", EntityKind::Function, "  ")),
            Err(IdentityError::InvalidArgument(_))
        ));
    }

    #[test]
    fn language_hint_overrides_the_extension() {
        let id = generate(
            &IdRequest::new("queries.inc", EntityKind::Table, "users").with_language("sql"),
        );
        assert!(id.gid.starts_with("sql:"));
    }

    #[test]
    fn signature_stripping() {
        assert_eq!(
            strip_signature("a.py::Function::f(Any,int)").as_deref(),
            Some("a.py::Function::f")
        );
        assert_eq!(
            strip_signature("a.py::Class::C::Method::m()").as_deref(),
            Some("a.py::Class::C::Method::m")
        );
        assert_eq!(strip_signature("a.py::Class::C"), None);
        assert_eq!(strip_signature("a.py::Function::f(Any)::local"), None);
    }
}
