use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::warn;

/// Ignore filtering: configured patterns match anywhere in the path
/// (`node_modules` drops `a/node_modules/b.py`), and editor/OS artifacts
/// are dropped regardless of configuration.
pub struct PathFilter {
    ignore: GlobSet,
}

impl PathFilter {
    pub fn new(patterns: &[String]) -> Self {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            match Glob::new(&format!("*{pattern}*")) {
                Ok(glob) => {
                    builder.add(glob);
                }
                Err(e) => warn!(pattern, error = %e, "invalid ignore pattern, skipping"),
            }
        }
        let ignore = builder.build().unwrap_or_else(|e| {
            warn!(error = %e, "ignore set failed to build, ignoring nothing");
            GlobSet::empty()
        });
        Self { ignore }
    }

    pub fn is_ignored(&self, path: &Path) -> bool {
        let text = path.to_string_lossy();
        // OS temp artifacts are always dropped.
        if text.ends_with('~') || text.ends_with(".DS_Store") {
            return true;
        }
        self.ignore.is_match(path)
    }
}
