//! Deterministic identity minting for code entities.
//!
//! Every analyzer, the resolver and the ingestion worker address entities
//! through the identifiers produced here: a human-readable canonical id
//! (`::`-separated, hierarchical) and a content-derived GID
//! (`<lang>:<sha256 hex>`) that is the MERGE key in the graph store. The
//! same inputs always produce the same pair, across processes and runs,
//! which is what lets independently-running analyzers emit edges into
//! files they have never seen.

mod canonical;
mod parse;

pub use canonical::{gid_for, normalize_path, strip_signature};
pub use parse::ParsedId;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum IdentityError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Entity kinds the identity service knows how to address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    File,
    Module,
    Class,
    Interface,
    Enum,
    Struct,
    Function,
    Method,
    Variable,
    Attribute,
    Import,
    Table,
    Column,
    ApiEndpoint,
    ApiCall,
    DatabaseQuery,
    HtmlElement,
    EnvironmentVariable,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::File => "File",
            EntityKind::Module => "Module",
            EntityKind::Class => "Class",
            EntityKind::Interface => "Interface",
            EntityKind::Enum => "Enum",
            EntityKind::Struct => "Struct",
            EntityKind::Function => "Function",
            EntityKind::Method => "Method",
            EntityKind::Variable => "Variable",
            EntityKind::Attribute => "Attribute",
            EntityKind::Import => "Import",
            EntityKind::Table => "Table",
            EntityKind::Column => "Column",
            EntityKind::ApiEndpoint => "ApiEndpoint",
            EntityKind::ApiCall => "ApiCall",
            EntityKind::DatabaseQuery => "DatabaseQuery",
            EntityKind::HtmlElement => "HtmlElement",
            EntityKind::EnvironmentVariable => "EnvironmentVariable",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "File" => Some(EntityKind::File),
            "Module" => Some(EntityKind::Module),
            "Class" => Some(EntityKind::Class),
            "Interface" => Some(EntityKind::Interface),
            "Enum" => Some(EntityKind::Enum),
            "Struct" => Some(EntityKind::Struct),
            "Function" => Some(EntityKind::Function),
            "Method" => Some(EntityKind::Method),
            "Variable" => Some(EntityKind::Variable),
            "Attribute" => Some(EntityKind::Attribute),
            "Import" => Some(EntityKind::Import),
            "Table" => Some(EntityKind::Table),
            "Column" => Some(EntityKind::Column),
            "ApiEndpoint" => Some(EntityKind::ApiEndpoint),
            "ApiCall" => Some(EntityKind::ApiCall),
            "DatabaseQuery" => Some(EntityKind::DatabaseQuery),
            "HtmlElement" => Some(EntityKind::HtmlElement),
            "EnvironmentVariable" => Some(EntityKind::EnvironmentVariable),
            _ => None,
        }
    }
}

/// Inputs to `GenerateId`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdRequest {
    /// Repository-relative path of the containing file.
    pub file_path: String,
    pub entity_type: EntityKind,
    /// Unqualified entity name (function name, route path, table name, …).
    pub name: String,
    /// Canonical id of the enclosing scope, when there is one.
    pub parent_canonical_id: Option<String>,
    /// Parameter type names for functions/methods; empty strings become `Any`.
    pub param_types: Vec<String>,
    /// Overrides the language inferred from the file extension.
    pub language_hint: Option<String>,
    /// Source module for imports (the `@<module>` part of the canonical).
    pub import_source: Option<String>,
}

impl IdRequest {
    pub fn new(file_path: impl Into<String>, entity_type: EntityKind, name: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            entity_type,
            name: name.into(),
            parent_canonical_id: None,
            param_types: Vec::new(),
            language_hint: None,
            import_source: None,
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent_canonical_id = Some(parent.into());
        self
    }

    pub fn with_params(mut self, params: Vec<String>) -> Self {
        self.param_types = params;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language_hint = Some(language.into());
        self
    }

    pub fn with_import_source(mut self, source: impl Into<String>) -> Self {
        self.import_source = Some(source.into());
        self
    }
}

/// Output of `GenerateId`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedId {
    pub canonical_id: String,
    pub gid: String,
}

/// The identity service surface. Stateless; any caching belongs to the
/// caller (analyzers keep a per-invocation LRU).
pub trait IdentityProvider: Send + Sync {
    fn generate_id(&self, request: &IdRequest) -> Result<GeneratedId, IdentityError>;
    fn parse_id(&self, id: &str) -> Result<ParsedId, IdentityError>;
}

/// In-process implementation. The service is a pure function of its
/// inputs, so there is no state to hold.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityService;

impl IdentityProvider for IdentityService {
    fn generate_id(&self, request: &IdRequest) -> Result<GeneratedId, IdentityError> {
        canonical::generate(request)
    }

    fn parse_id(&self, id: &str) -> Result<ParsedId, IdentityError> {
        parse::parse(id)
    }
}
