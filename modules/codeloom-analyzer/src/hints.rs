//! Manual hint comments.
//!
//! `# bmcp:call-target <ID>`, `# bmcp:imports <ID>` and
//! `# bmcp:uses-type <ID>` let authors assert relationships the analyzers
//! cannot see (reflection, dynamic dispatch, config-driven wiring). The
//! `<ID>` is taken literally as the relationship target.

use codeloom_common::{Properties, RelationshipStub};

const HINT_PREFIX: &str = "bmcp:";

/// Scan source text for hint comments and emit synthetic relationships
/// from the file node.
pub fn parse_hint_comments(source: &str, file_gid: &str, comment_marker: &str) -> Vec<RelationshipStub> {
    let mut relationships = Vec::new();
    for line in source.lines() {
        let trimmed = line.trim_start();
        let Some(comment) = trimmed.strip_prefix(comment_marker) else {
            continue;
        };
        let Some(hint) = comment.trim_start().strip_prefix(HINT_PREFIX) else {
            continue;
        };
        let mut parts = hint.splitn(2, char::is_whitespace);
        let kind = parts.next().unwrap_or("");
        let Some(target) = parts.next().map(str::trim).filter(|t| !t.is_empty()) else {
            continue;
        };

        let rel_type = match kind {
            "call-target" => "CALLS",
            "imports" => "IMPORTS",
            "uses-type" => "USES_TYPE",
            _ => continue,
        };

        let mut properties = Properties::new();
        properties.insert("manual_hint".to_string(), true.into());
        properties.insert("hint_type".to_string(), kind.to_string().into());
        relationships.push(RelationshipStub {
            source_gid: file_gid.to_string(),
            target_canonical_id: target.to_string(),
            rel_type: rel_type.to_string(),
            properties,
        });
    }
    relationships
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_three_hint_kinds() {
        let source = "\
import os
# bmcp:call-target legacy/dispatch.py::Function::route(Any)
x = 1  # not a hint
  # bmcp:imports legacy/dispatch.py::File::dispatch.py
# bmcp:uses-type legacy/models.py::Class::Order
# bmcp:unknown-kind ignored
# bmcp:imports
";
        let rels = parse_hint_comments(source, "python:filegid", "#");
        assert_eq!(rels.len(), 3);
        assert_eq!(rels[0].rel_type, "CALLS");
        assert_eq!(
            rels[0].target_canonical_id,
            "legacy/dispatch.py::Function::route(Any)"
        );
        assert_eq!(rels[1].rel_type, "IMPORTS");
        assert_eq!(rels[2].rel_type, "USES_TYPE");
        for rel in &rels {
            assert_eq!(rel.source_gid, "python:filegid");
            assert_eq!(rel.properties.get("manual_hint").unwrap(), &true);
        }
    }
}
