//! Per-language analyzer workers.
//!
//! Each analyzer consumes its language's job queue, parses one file per
//! job into node and relationship stubs (calling the identity service for
//! every entity), and publishes an [`AnalyzerResult`] onto the shared
//! results queue. The Python tree-sitter analyzer is the reference
//! implementation of the contract; the SQL schema analyzer gives the
//! cross-language heuristics their table and column targets.

pub mod hints;
pub mod idcache;
pub mod mirror;
pub mod python;
pub mod sql;
pub mod worker;

use codeloom_common::{AnalysisJob, AnalyzerResult};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("identity error: {0}")]
    Identity(#[from] codeloom_identity::IdentityError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parser initialization failed: {0}")]
    Parser(String),
}

/// One language analyzer. `analyze` is called for CREATED/MODIFIED jobs
/// with the file content already read. Per-file parse failures are
/// reported inside the result (`error` set, empty lists), not as an Err;
/// only infrastructure failures abort the job.
pub trait Analyzer: Send + Sync {
    fn language(&self) -> &'static str;

    fn analyze(&self, job: &AnalysisJob, content: &str) -> Result<AnalyzerResult, AnalyzerError>;
}

/// Build the analyzer selected by configuration.
pub fn analyzer_for(language: &str) -> Option<Box<dyn Analyzer>> {
    match language {
        "python" => Some(Box::new(python::PythonAnalyzer::new())),
        "sql" => Some(Box::new(sql::SqlAnalyzer::new())),
        _ => None,
    }
}
