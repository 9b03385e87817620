//! Definition registry built during canonicalization.
//!
//! Maps every definition-site canonical id to its defining node and keeps
//! secondary indexes (simple form, name, file path) that the call- and
//! reference-resolution passes look through.

use std::collections::HashMap;

use codeloom_common::vocab::is_definition_label;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct Definition {
    pub gid: String,
    pub canonical_id: String,
    pub name: String,
    pub file_path: String,
    pub label: String,
}

#[derive(Debug, Default)]
pub struct DefinitionRegistry {
    by_canonical: HashMap<String, Definition>,
    /// signature-stripped canonical → full canonical
    by_simple: HashMap<String, String>,
    /// (label, name) → canonicals, insertion-ordered
    by_name: HashMap<(String, String), Vec<String>>,
    /// normalized file path → File node canonical
    files_by_path: HashMap<String, String>,
}

impl DefinitionRegistry {
    /// Register a node if its label marks a definition site. Duplicate
    /// canonical ids keep the first-seen definition.
    pub fn insert(&mut self, label: &str, gid: &str, canonical_id: &str, name: &str, file_path: &str) {
        if !is_definition_label(label) {
            return;
        }
        if self.by_canonical.contains_key(canonical_id) {
            warn!(canonical_id, "duplicate canonical id; keeping first-seen definition");
            return;
        }

        let definition = Definition {
            gid: gid.to_string(),
            canonical_id: canonical_id.to_string(),
            name: name.to_string(),
            file_path: file_path.to_string(),
            label: label.to_string(),
        };

        if let Some(simple) = codeloom_identity::strip_signature(canonical_id) {
            self.by_simple.insert(simple, canonical_id.to_string());
        }
        self.by_name
            .entry((label.to_string(), name.to_string()))
            .or_default()
            .push(canonical_id.to_string());
        if label == "File" {
            self.files_by_path
                .insert(file_path.to_string(), canonical_id.to_string());
        }
        self.by_canonical.insert(canonical_id.to_string(), definition);
    }

    pub fn contains(&self, canonical_id: &str) -> bool {
        self.by_canonical.contains_key(canonical_id)
    }

    pub fn get(&self, canonical_id: &str) -> Option<&Definition> {
        self.by_canonical.get(canonical_id)
    }

    /// Resolve by exact canonical or by signature-stripped form.
    pub fn resolve_loose(&self, target: &str) -> Option<&Definition> {
        if let Some(def) = self.by_canonical.get(target) {
            return Some(def);
        }
        self.by_simple
            .get(target)
            .and_then(|canonical| self.by_canonical.get(canonical))
    }

    /// Definitions with the given label and name, in insertion order.
    pub fn by_name(&self, label: &str, name: &str) -> Vec<&Definition> {
        self.by_name
            .get(&(label.to_string(), name.to_string()))
            .map(|canonicals| {
                canonicals
                    .iter()
                    .filter_map(|c| self.by_canonical.get(c))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// A callable (Function or Method) definition with the given name:
    /// prefer one in `file_path`, otherwise a unique global match.
    pub fn callable_by_name(&self, name: &str, file_path: &str) -> Option<&Definition> {
        self.named_definition(&["Function", "Method"], name, file_path)
    }

    /// As `callable_by_name`, over the given labels.
    pub fn named_definition(
        &self,
        labels: &[&str],
        name: &str,
        file_path: &str,
    ) -> Option<&Definition> {
        let mut matches: Vec<&Definition> = Vec::new();
        for label in labels {
            matches.extend(self.by_name(label, name));
        }
        if let Some(local) = matches.iter().find(|d| d.file_path == file_path) {
            return Some(local);
        }
        match matches.len() {
            1 => Some(matches[0]),
            _ => None,
        }
    }

    pub fn file_canonical(&self, file_path: &str) -> Option<&str> {
        self.files_by_path.get(file_path).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_canonical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_canonical.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> DefinitionRegistry {
        let mut r = DefinitionRegistry::default();
        r.insert(
            "Function",
            "python:aaa",
            "module.py::Function::utility_function(Any)",
            "utility_function",
            "module.py",
        );
        r.insert(
            "File",
            "python:bbb",
            "module.py::File::module.py",
            "module.py",
            "module.py",
        );
        r
    }

    #[test]
    fn loose_resolution_ignores_signatures() {
        let r = registry();
        assert!(r.resolve_loose("module.py::Function::utility_function(Any)").is_some());
        let byv = r.resolve_loose("module.py::Function::utility_function").unwrap();
        assert_eq!(byv.gid, "python:aaa");
        assert!(r.resolve_loose("module.py::Function::other").is_none());
    }

    #[test]
    fn callable_lookup_prefers_local_then_unique() {
        let mut r = registry();
        assert_eq!(
            r.callable_by_name("utility_function", "main.py").unwrap().gid,
            "python:aaa"
        );

        // A second definition with the same name makes the global lookup
        // ambiguous, but the local one still wins.
        r.insert(
            "Function",
            "python:ccc",
            "other.py::Function::utility_function()",
            "utility_function",
            "other.py",
        );
        assert!(r.callable_by_name("utility_function", "main.py").is_none());
        assert_eq!(
            r.callable_by_name("utility_function", "other.py").unwrap().gid,
            "python:ccc"
        );
    }

    #[test]
    fn duplicate_canonicals_keep_first() {
        let mut r = registry();
        r.insert(
            "Function",
            "python:zzz",
            "module.py::Function::utility_function(Any)",
            "utility_function",
            "module.py",
        );
        assert_eq!(
            r.get("module.py::Function::utility_function(Any)").unwrap().gid,
            "python:aaa"
        );
    }

    #[test]
    fn file_lookup_by_path() {
        let r = registry();
        assert_eq!(r.file_canonical("module.py"), Some("module.py::File::module.py"));
        assert_eq!(r.file_canonical("missing.py"), None);
    }
}
