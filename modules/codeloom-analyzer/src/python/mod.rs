//! Python analyzer: tree-sitter AST visitor with an explicit scope stack.

mod patterns;
mod visitor;

use codeloom_common::{AnalysisJob, AnalyzerResult};

use crate::{Analyzer, AnalyzerError};

pub struct PythonAnalyzer;

impl PythonAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PythonAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer for PythonAnalyzer {
    fn language(&self) -> &'static str {
        "python"
    }

    fn analyze(&self, job: &AnalysisJob, content: &str) -> Result<AnalyzerResult, AnalyzerError> {
        visitor::analyze_source(&job.file_path, content)
    }
}
