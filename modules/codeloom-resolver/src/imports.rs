//! Import bookkeeping: maps module references to predicted repository
//! paths so imports and calls can be linked across files before (or
//! without) both sides being analyzed.

use std::collections::HashMap;

use codeloom_common::RelationshipStub;

/// One import recorded from a file's IMPORTS relationships.
#[derive(Debug, Clone)]
pub struct ImportRecord {
    pub imported_name: Option<String>,
    pub alias: Option<String>,
    pub module: String,
    pub level: u32,
}

impl ImportRecord {
    /// The name this import binds in the importing file's namespace.
    pub fn binding(&self) -> Option<&str> {
        self.alias
            .as_deref()
            .or(self.imported_name.as_deref())
            .or(if self.module.is_empty() {
                None
            } else {
                Some(self.module.as_str())
            })
    }
}

/// Imports grouped by importing file path.
#[derive(Debug, Default)]
pub struct ImportIndex {
    by_file: HashMap<String, Vec<ImportRecord>>,
}

impl ImportIndex {
    pub fn record(&mut self, file_path: &str, rel: &RelationshipStub) {
        let record = ImportRecord {
            imported_name: rel
                .properties
                .get("imported_name")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            alias: rel
                .properties
                .get("alias")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            module: rel
                .properties
                .get("source_module")
                .and_then(|v| v.as_str())
                .unwrap_or(&rel.target_canonical_id)
                .trim_start_matches('.')
                .to_string(),
            level: rel
                .properties
                .get("level")
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as u32,
        };
        self.by_file.entry(file_path.to_string()).or_default().push(record);
    }

    pub fn for_file(&self, file_path: &str) -> &[ImportRecord] {
        self.by_file.get(file_path).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Find the import that binds `name` as a symbol (`from m import name`
    /// or `from m import x as name`).
    pub fn symbol_import(&self, file_path: &str, name: &str) -> Option<&ImportRecord> {
        self.for_file(file_path).iter().find(|imp| {
            imp.imported_name.is_some()
                && (imp.alias.as_deref() == Some(name)
                    || (imp.alias.is_none() && imp.imported_name.as_deref() == Some(name)))
        })
    }

    /// Find the import that binds `name` as a module (`import m` or
    /// `import m as name`).
    pub fn module_import(&self, file_path: &str, name: &str) -> Option<&ImportRecord> {
        self.for_file(file_path).iter().find(|imp| {
            imp.imported_name.is_none()
                && (imp.alias.as_deref() == Some(name) || imp.module == name)
        })
    }
}

/// Predict the repository path a module reference points at.
///
/// Absolute imports resolve from the repository root (`pkg.mod` →
/// `pkg/mod.py`); relative imports resolve against the importing file's
/// package directory, one level up per extra leading dot.
pub fn predict_module_path(source_file: &str, module: &str, level: u32) -> Option<String> {
    if module.is_empty() {
        return None;
    }
    let relative = module.replace('.', "/") + ".py";
    if level == 0 {
        return Some(relative);
    }

    let mut dir = parent_dir(source_file);
    for _ in 1..level {
        dir = parent_dir(dir);
    }
    if dir.is_empty() {
        Some(relative)
    } else {
        Some(format!("{dir}/{relative}"))
    }
}

fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// Python standard-library prefixes that get an `External` module node
/// instead of a predicted repository path.
pub fn is_stdlib_module(module: &str) -> bool {
    const STDLIB: [&str; 36] = [
        "os", "sys", "json", "re", "time", "datetime", "logging", "math", "typing",
        "pathlib", "collections", "itertools", "functools", "subprocess", "threading",
        "asyncio", "unittest", "random", "string", "io", "csv", "http", "urllib",
        "socket", "sqlite3", "abc", "enum", "dataclasses", "contextlib", "copy",
        "hashlib", "base64", "uuid", "tempfile", "shutil", "traceback",
    ];
    let first = module.split('.').next().unwrap_or(module);
    STDLIB.contains(&first)
}
