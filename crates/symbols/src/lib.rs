//! Symbol Index: per-language extraction of functions, types, and call
//! edges, content-hash-gated so re-indexing an unchanged file is a no-op.
//!
//! One [`LanguageAnalyzer`] per supported language, tree-sitter-backed,
//! dispatched by file extension through a [`registry::LanguageRegistry`].
//! The analyzer trait shape is the same capability-bundle pattern this
//! codebase's lineage already uses for multi-language source inspection:
//! extraction is a handful of independent queries over one parse, not a
//! class hierarchy per language.

mod index;
mod lang;
mod registry;
mod util;

pub use index::SymbolIndex;
pub use registry::{LanguageAnalyzer, LanguageRegistry};

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum SymbolsError {
    #[error("unsupported file extension: {0}")]
    UnsupportedExtension(String),
    #[error("failed to parse {path}")]
    Parse { path: String },
    #[error("invalid tree-sitter query: {0}")]
    Query(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SymbolKind {
    Function,
    Method,
    Struct,
    Class,
    Enum,
    Interface,
    Trait,
    Const,
    TypeAlias,
}

impl SymbolKind {
    fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Method => "method",
            SymbolKind::Struct => "struct",
            SymbolKind::Class => "class",
            SymbolKind::Enum => "enum",
            SymbolKind::Interface => "interface",
            SymbolKind::Trait => "trait",
            SymbolKind::Const => "const",
            SymbolKind::TypeAlias => "typeAlias",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    pub file_path: String,
    pub kind: SymbolKind,
    pub qualified_name: String,
    pub start_line: usize,
    pub end_line: usize,
    pub signature: String,
    pub doc: Option<String>,
    pub parent: Option<String>,
    pub modifiers: Vec<String>,
}

impl Symbol {
    /// Stable identity used as a graph node key: `<kind>:<file>:<qualifiedName>`.
    /// Two symbols with the same kind/file/name are the same symbol across
    /// re-indexes, which is what lets callers hold onto a `CallEdge`'s
    /// `caller_symbol_id` across incremental updates.
    pub fn id(&self) -> String {
        format!("{}:{}:{}", self.kind.as_str(), self.file_path, self.qualified_name)
    }

    pub fn is_exported(&self) -> bool {
        self.modifiers.iter().any(|m| m == "pub" || m == "export" || m == "public")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CallType {
    Direct,
    Method,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallEdge {
    pub caller_symbol_id: String,
    pub callee_name: String,
    pub file: String,
    pub line: usize,
    pub call_type: CallType,
}
