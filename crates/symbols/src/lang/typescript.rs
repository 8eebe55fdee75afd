use std::path::Path;

use tree_sitter::{Node, Query, QueryCursor};

use crate::registry::LanguageAnalyzer;
use crate::util::{self, first_line_signature, leading_doc_comment, line_of, node_text};
use crate::{CallEdge, CallType, Symbol, SymbolKind, SymbolsError};

/// Handles `.ts`/`.tsx`/`.js`/`.jsx` under one grammar. The TSX grammar is a
/// strict superset that also parses plain TS/JS, so one parser instance
/// covers the whole extension set without a per-extension language switch.
pub struct TypeScriptAnalyzer;

const DEF_QUERIES: &[(&str, SymbolKind)] = &[
    (r#"(function_declaration name: (identifier) @name) @def"#, SymbolKind::Function),
    (r#"(class_declaration name: (type_identifier) @name) @def"#, SymbolKind::Class),
    (r#"(interface_declaration name: (type_identifier) @name) @def"#, SymbolKind::Interface),
    (r#"(method_definition name: (property_identifier) @name) @def"#, SymbolKind::Method),
];

impl LanguageAnalyzer for TypeScriptAnalyzer {
    fn language(&self) -> &'static str {
        "typescript"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["ts", "tsx", "js", "jsx", "mjs", "cjs"]
    }

    fn extract_symbols(&self, path: &Path, source: &[u8]) -> Result<Vec<Symbol>, SymbolsError> {
        let language = tree_sitter_typescript::language_tsx();
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

                let mut modifiers = Vec::new();
                if is_exported(def_node) {
                    modifiers.push("export".to_string());
                }

                let (parent, qualified_name) = if *kind == SymbolKind::Method {
                    match enclosing_class(def_node, source) {
                        Some(p) => (Some(p.clone()), format!("{p}.{name}")),
                        None => (None, name.clone()),
                    }
                } else {
                    (None, name.clone())
                };

                symbols.push(Symbol {
                    file_path: file_path.clone(),
                    kind: *kind,
                    qualified_name,
                    start_line,
                    end_line,
                    signature: first_line_signature(def_text),
                    doc: leading_doc_comment(text, start_line, &["//", "*", "/**"]),
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
        let language = tree_sitter_typescript::language_tsx();
        let tree = util::parse(language, source)?;
        let root = tree.root_node();
        let file_path = path.to_string_lossy().replace('\\', "/");
        let mut edges = Vec::new();

        for (query_src, call_type) in [
            (r#"(call_expression function: (identifier) @callee)"#, CallType::Direct),
            (
                r#"(call_expression function: (member_expression property: (property_identifier) @callee))"#,
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
        let language = tree_sitter_typescript::language_tsx();
        let tree = util::parse(language, source)?;
        let root = tree.root_node();
        let query = Query::new(language, r#"(import_statement source: (string) @path)"#)
            .map_err(|e| SymbolsError::Query(e.to_string()))?;
        let mut cursor = QueryCursor::new();
        let mut out = Vec::new();
        for m in cursor.matches(&query, root, source) {
            for cap in m.captures {
                let raw = node_text(source, (cap.node.start_byte(), cap.node.end_byte()));
                out.push(raw.trim_matches(|c| c == '"' || c == '\'' || c == '`').to_string());
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

fn is_exported(node: Node) -> bool {
    node.parent().map(|p| p.kind() == "export_statement").unwrap_or(false)
}

fn enclosing_class(node: Node, source: &[u8]) -> Option<String> {
    let mut cur = node.parent();
    while let Some(n) = cur {
        if n.kind() == "class_declaration" {
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
import { helper } from "./helper";

export function greet(name) {
    return helper(name);
}

class Greeter {
    hello() {
        return greet("world");
    }
}
"#;

    #[test]
    fn extracts_exported_function_and_method() {
        let analyzer = TypeScriptAnalyzer;
        let path = PathBuf::from("app.ts");
        let symbols = analyzer.extract_symbols(&path, SRC.as_bytes()).unwrap();
        let greet = symbols.iter().find(|s| s.qualified_name == "greet").unwrap();
        assert!(greet.is_exported());
        let hello = symbols.iter().find(|s| s.qualified_name == "Greeter.hello").unwrap();
        assert_eq!(hello.parent.as_deref(), Some("Greeter"));
    }

    #[test]
    fn extracts_imports() {
        let analyzer = TypeScriptAnalyzer;
        let imports = analyzer.get_imports(&PathBuf::from("app.ts"), SRC.as_bytes()).unwrap();
        assert_eq!(imports, vec!["./helper"]);
    }
}
