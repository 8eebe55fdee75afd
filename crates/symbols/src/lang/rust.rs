use std::path::Path;

use tree_sitter::{Node, Query, QueryCursor};

use crate::registry::LanguageAnalyzer;
use crate::util::{self, first_line_signature, leading_doc_comment, line_of, node_text};
use crate::{CallEdge, CallType, Symbol, SymbolKind, SymbolsError};

pub struct RustAnalyzer;

const DEF_QUERIES: &[(&str, SymbolKind)] = &[
    (r#"(function_item name: (identifier) @name) @def"#, SymbolKind::Function),
    (r#"(struct_item name: (type_identifier) @name) @def"#, SymbolKind::Struct),
    (r#"(enum_item name: (type_identifier) @name) @def"#, SymbolKind::Enum),
    (r#"(trait_item name: (type_identifier) @name) @def"#, SymbolKind::Trait),
    (r#"(const_item name: (identifier) @name) @def"#, SymbolKind::Const),
    (r#"(type_item name: (type_identifier) @name) @def"#, SymbolKind::TypeAlias),
];

impl LanguageAnalyzer for RustAnalyzer {
    fn language(&self) -> &'static str {
        "rust"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["rs"]
    }

    fn extract_symbols(&self, path: &Path, source: &[u8]) -> Result<Vec<Symbol>, SymbolsError> {
        let language = tree_sitter_rust::language();
        let tree = util::parse(language, source)?;
        let root = tree.root_node();
        let text = std::str::from_utf8(source).unwrap_or("");
        let file_path = path.to_string_lossy().replace('\\', "/");

        let mut symbols = Vec::new();
        for (query_src, kind) in DEF_QUERIES {
            let query = Query::new(language, query_src).map_err(|e| SymbolsError::Query(e.to_string()))?;
            let mut cursor = QueryCursor::new();
            for m in cursor.matches(&query, root, source) {
                let mut name_node: Option<Node> = None;
                let mut def_node: Option<Node> = None;
                for cap in m.captures {
                    match query.capture_names()[cap.index as usize].as_str() {
                        "name" => name_node = Some(cap.node),
                        "def" => def_node = Some(cap.node),
                        _ => {}
                    }
                }
                let (Some(name_node), Some(def_node)) = (name_node, def_node) else {
                    continue;
                };
                let name = node_text(source, (name_node.start_byte(), name_node.end_byte())).to_string();
                let def_text = node_text(source, (def_node.start_byte(), def_node.end_byte()));
                let start_line = line_of(source, def_node.start_byte());
                let end_line = line_of(source, def_node.end_byte());
                let modifiers = modifiers_of(def_text);

                let (kind, parent, qualified_name) = if *kind == SymbolKind::Function {
                    match enclosing_type(def_node, source) {
                        Some(parent) => (SymbolKind::Method, Some(parent.clone()), format!("{parent}::{name}")),
                        None => (SymbolKind::Function, None, name.clone()),
                    }
                } else {
                    (*kind, None, name.clone())
                };

                symbols.push(Symbol {
                    file_path: file_path.clone(),
                    kind,
                    qualified_name,
                    start_line,
                    end_line,
                    signature: first_line_signature(def_text),
                    doc: leading_doc_comment(text, start_line, &["///", "//!"]),
                    parent,
                    modifiers,
                });
            }
        }
        symbols.sort_by_key(|s| s.start_line);
        Ok(symbols)
    }

    fn extract_calls(
        &self,
        path: &Path,
        source: &[u8],
        symbols: &[Symbol],
    ) -> Result<Vec<CallEdge>, SymbolsError> {
        let language = tree_sitter_rust::language();
        let tree = util::parse(language, source)?;
        let root = tree.root_node();
        let file_path = path.to_string_lossy().replace('\\', "/");
        let mut edges = Vec::new();

        for (query_src, call_type) in [
            (r#"(call_expression function: (identifier) @callee)"#, CallType::Direct),
            (
                r#"(call_expression function: (field_expression field: (field_identifier) @callee))"#,
                CallType::Method,
            ),
        ] {
            let query = Query::new(language, query_src).map_err(|e| SymbolsError::Query(e.to_string()))?;
            let mut cursor = QueryCursor::new();
            for m in cursor.matches(&query, root, source) {
                for cap in m.captures {
                    let line = line_of(source, cap.node.start_byte());
                    let callee_name = node_text(source, (cap.node.start_byte(), cap.node.end_byte())).to_string();
                    if let Some(caller) = enclosing_symbol(symbols, line) {
                        edges.push(CallEdge {
                            caller_symbol_id: caller.id(),
                            callee_name,
                            file: file_path.clone(),
                            line,
                            call_type,
                        });
                    }
                }
            }
        }
        Ok(edges)
    }

    fn get_imports(&self, _path: &Path, source: &[u8]) -> Result<Vec<String>, SymbolsError> {
        let language = tree_sitter_rust::language();
        let tree = util::parse(language, source)?;
        let root = tree.root_node();
        let query = Query::new(language, r#"(use_declaration argument: (_) @path)"#)
            .map_err(|e| SymbolsError::Query(e.to_string()))?;
        let mut cursor = QueryCursor::new();
        let mut out = Vec::new();
        for m in cursor.matches(&query, root, source) {
            for cap in m.captures {
                out.push(node_text(source, (cap.node.start_byte(), cap.node.end_byte())).to_string());
            }
        }
        Ok(out)
    }

    fn get_exports(&self, path: &Path, source: &[u8]) -> Result<Vec<String>, SymbolsError> {
        Ok(self
            .extract_symbols(path, source)?
            .into_iter()
            .filter(|s| s.is_exported())
            .map(|s| s.qualified_name)
            .collect())
    }

    fn get_function_body(
        &self,
        path: &Path,
        source: &[u8],
        qualified_name: &str,
    ) -> Result<Option<String>, SymbolsError> {
        let symbols = self.extract_symbols(path, source)?;
        let Some(sym) = symbols
            .into_iter()
            .find(|s| matches!(s.kind, SymbolKind::Function | SymbolKind::Method) && s.qualified_name == qualified_name)
        else {
            return Ok(None);
        };
        let text = std::str::from_utf8(source).unwrap_or("");
        let lines: Vec<&str> = text.lines().collect();
        let start = sym.start_line.saturating_sub(1);
        let end = sym.end_line.min(lines.len());
        Ok(Some(lines[start..end].join("\n")))
    }
}

fn modifiers_of(def_text: &str) -> Vec<String> {
    let mut mods = Vec::new();
    let trimmed = def_text.trim_start();
    if trimmed.starts_with("pub") {
        mods.push("pub".to_string());
    }
    if trimmed.contains("async fn") {
        mods.push("async".to_string());
    }
    mods
}

fn enclosing_type(node: Node, source: &[u8]) -> Option<String> {
    let mut cur = node.parent();
    while let Some(n) = cur {
        if n.kind() == "impl_item" {
            if let Some(type_node) = n.child_by_field_name("type") {
                return Some(node_text(source, (type_node.start_byte(), type_node.end_byte())).to_string());
            }
        }
        if n.kind() == "trait_item" {
            if let Some(name_node) = n.child_by_field_name("name") {
                return Some(node_text(source, (name_node.start_byte(), name_node.end_byte())).to_string());
            }
        }
        cur = n.parent();
    }
    None
}

fn enclosing_symbol(symbols: &[Symbol], line: usize) -> Option<&Symbol> {
    symbols
        .iter()
        .filter(|s| matches!(s.kind, SymbolKind::Function | SymbolKind::Method) && s.start_line <= line && line <= s.end_line)
        .min_by_key(|s| s.end_line - s.start_line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const SRC: &str = r#"
/// Adds two numbers.
pub fn add(a: i32, b: i32) -> i32 {
    a + b
}

struct Counter {
    value: i32,
}

impl Counter {
    pub fn increment(&mut self) {
        self.value = add(self.value, 1);
    }
}
"#;

    #[test]
    fn extracts_free_function_and_method() {
        let analyzer = RustAnalyzer;
        let symbols = analyzer.extract_symbols(&PathBuf::from("lib.rs"), SRC.as_bytes()).unwrap();
        let add = symbols.iter().find(|s| s.qualified_name == "add").unwrap();
        assert_eq!(add.kind, SymbolKind::Function);
        assert!(add.is_exported());
        assert_eq!(add.doc.as_deref(), Some("Adds two numbers."));

        let inc = symbols.iter().find(|s| s.qualified_name == "Counter::increment").unwrap();
        assert_eq!(inc.kind, SymbolKind::Method);
        assert_eq!(inc.parent.as_deref(), Some("Counter"));
    }

    #[test]
    fn extracts_call_edge_into_caller() {
        let analyzer = RustAnalyzer;
        let path = PathBuf::from("lib.rs");
        let symbols = analyzer.extract_symbols(&path, SRC.as_bytes()).unwrap();
        let calls = analyzer.extract_calls(&path, SRC.as_bytes(), &symbols).unwrap();
        let edge = calls.iter().find(|c| c.callee_name == "add").unwrap();
        assert_eq!(edge.caller_symbol_id, symbols.iter().find(|s| s.qualified_name == "Counter::increment").unwrap().id());
    }

    #[test]
    fn function_body_round_trips() {
        let analyzer = RustAnalyzer;
        let path = PathBuf::from("lib.rs");
        let body = analyzer.get_function_body(&path, SRC.as_bytes(), "add").unwrap().unwrap();
        assert!(body.contains("a + b"));
    }
}
