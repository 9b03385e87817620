use crate::{EntityKind, IdentityError};

/// Components recovered from a canonical id or a GID.
///
/// For a GID only the language prefix is recoverable; for a canonical id
/// the `::`-separated structure is parsed back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedId {
    pub is_gid: bool,
    pub language: Option<String>,
    pub file_path: Option<String>,
    pub entity_type: Option<String>,
    pub name: Option<String>,
    pub parent_canonical_id: Option<String>,
}

pub(crate) fn parse(id: &str) -> Result<ParsedId, IdentityError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(IdentityError::InvalidArgument("id is empty".into()));
    }

    if let Some(language) = gid_language(id) {
        return Ok(ParsedId {
            is_gid: true,
            language: Some(language.to_string()),
            file_path: None,
            entity_type: None,
            name: None,
            parent_canonical_id: None,
        });
    }

    parse_canonical(id)
}

/// A GID is `<lang>:<64 lowercase hex>` with no `::` structure.
fn gid_language(id: &str) -> Option<&str> {
    if id.contains("::") {
        return None;
    }
    let (language, digest) = id.split_once(':')?;
    if language.is_empty() || digest.len() != 64 {
        return None;
    }
    if !digest.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()) {
        return None;
    }
    Some(language)
}

fn parse_canonical(id: &str) -> Result<ParsedId, IdentityError> {
    // Imports carry their own marker: <file_canonical>::IMPORT:<name>@<source>
    if let Some((file_canonical, import_part)) = id.split_once("::IMPORT:") {
        let name = import_part.split('@').next().unwrap_or(import_part);
        if name.is_empty() {
            return Err(IdentityError::InvalidArgument(format!(
                "malformed import id: {id}"
            )));
        }
        return Ok(ParsedId {
            is_gid: false,
            language: None,
            file_path: Some(first_segment(file_canonical).to_string()),
            entity_type: Some("Import".to_string()),
            name: Some(name.to_string()),
            parent_canonical_id: Some(file_canonical.to_string()),
        });
    }

    let segments: Vec<&str> = id.split("::").collect();
    if segments.is_empty() || segments[0].is_empty() {
        return Err(IdentityError::InvalidArgument(format!("malformed id: {id}")));
    }

    // Find the last segment that is a kind tag; the segment after it is
    // the entity name. Anything after the name means the id addresses a
    // variable scoped beneath that entity.
    let marker = segments
        .iter()
        .enumerate()
        .rev()
        .find(|(i, s)| *i > 0 && EntityKind::from_tag(s).is_some() && *i + 1 < segments.len());

    let (entity_type, name_idx) = match marker {
        Some((idx, tag)) if idx + 2 == segments.len() => (tag.to_string(), idx + 1),
        // Trailing segments after the named entity: a scoped variable.
        Some((_, _)) => ("Variable".to_string(), segments.len() - 1),
        // No marker at all: bare `<scope>::<name>` variable form, or just a path.
        None => {
            if segments.len() == 1 {
                return Err(IdentityError::InvalidArgument(format!(
                    "id has no entity structure: {id}"
                )));
            }
            ("Variable".to_string(), segments.len() - 1)
        }
    };

    let name = strip_signature_segment(segments[name_idx]);
    let parent_end = if entity_type == "Variable" {
        name_idx
    } else {
        name_idx - 1
    };
    // Files and modules are roots; the segment before the marker is the
    // path itself, not an enclosing scope.
    let parent = if parent_end == 0 || entity_type == "File" || entity_type == "Module" {
        None
    } else {
        Some(segments[..parent_end].join("::"))
    };

    Ok(ParsedId {
        is_gid: false,
        language: None,
        file_path: Some(segments[0].to_string()),
        entity_type: Some(entity_type),
        name: Some(name),
        parent_canonical_id: parent,
    })
}

fn first_segment(canonical: &str) -> &str {
    canonical.split("::").next().unwrap_or(canonical)
}

fn strip_signature_segment(segment: &str) -> String {
    match segment.find('(') {
        Some(idx) if segment.ends_with(')') => segment[..idx].to_string(),
        _ => segment.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GeneratedId, IdRequest, IdentityProvider, IdentityService};
    use pretty_assertions::assert_eq;

    fn service() -> IdentityService {
        IdentityService
    }

    #[test]
    fn gid_round_trip_recovers_language() {
        let generated: GeneratedId = service()
            .generate_id(&IdRequest::new("a.py", EntityKind::File, "a.py"))
            .unwrap();
        let parsed = service().parse_id(&generated.gid).unwrap();
        assert!(parsed.is_gid);
        assert_eq!(parsed.language.as_deref(), Some("python"));
    }

    #[test]
    fn canonical_round_trip_for_function() {
        let generated = service()
            .generate_id(
                &IdRequest::new("src/module.py", EntityKind::Function, "utility_function")
                    .with_parent("src/module.py::File::module.py")
                    .with_params(vec!["Any".into()]),
            )
            .unwrap();
        let parsed = service().parse_id(&generated.canonical_id).unwrap();
        assert!(!parsed.is_gid);
        assert_eq!(parsed.file_path.as_deref(), Some("src/module.py"));
        assert_eq!(parsed.entity_type.as_deref(), Some("Function"));
        assert_eq!(parsed.name.as_deref(), Some("utility_function"));
        assert_eq!(parsed.parent_canonical_id.as_deref(), Some("src/module.py"));
    }

    #[test]
    fn canonical_round_trip_for_method() {
        let parsed = service()
            .parse_id("src/svc.py::Class::DataService::Method::fetch(Any,int)")
            .unwrap();
        assert_eq!(parsed.entity_type.as_deref(), Some("Method"));
        assert_eq!(parsed.name.as_deref(), Some("fetch"));
        assert_eq!(
            parsed.parent_canonical_id.as_deref(),
            Some("src/svc.py::Class::DataService")
        );
    }

    #[test]
    fn canonical_round_trip_for_import() {
        let parsed = service()
            .parse_id("main.py::File::main.py::IMPORT:utility_function@module")
            .unwrap();
        assert_eq!(parsed.entity_type.as_deref(), Some("Import"));
        assert_eq!(parsed.name.as_deref(), Some("utility_function"));
        assert_eq!(parsed.file_path.as_deref(), Some("main.py"));
    }

    #[test]
    fn scoped_variable_parses_as_variable() {
        let parsed = service().parse_id("a.py::Function::sum(Any)::total").unwrap();
        assert_eq!(parsed.entity_type.as_deref(), Some("Variable"));
        assert_eq!(parsed.name.as_deref(), Some("total"));
        assert_eq!(
            parsed.parent_canonical_id.as_deref(),
            Some("a.py::Function::sum(Any)")
        );
    }

    #[test]
    fn file_canonical_parses() {
        let parsed = service().parse_id("src/module.py::File::module.py").unwrap();
        assert_eq!(parsed.entity_type.as_deref(), Some("File"));
        assert_eq!(parsed.name.as_deref(), Some("module.py"));
        assert_eq!(parsed.parent_canonical_id, None);
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        assert!(service().parse_id("").is_err());
        assert!(service().parse_id("   ").is_err());
        assert!(service().parse_id("just-a-path.py").is_err());
    }

    #[test]
    fn uppercase_hex_is_not_a_gid() {
        let id = format!("python:{}", "A".repeat(64));
        // Not a GID; also not a parseable canonical.
        assert!(service().parse_id(&id).is_err());
    }
}
