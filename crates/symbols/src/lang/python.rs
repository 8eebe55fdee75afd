use std::path::Path;

use tree_sitter::{Node, Query, QueryCursor};

use crate::registry::LanguageAnalyzer;
use crate::util::{self, first_line_signature, leading_doc_comment, line_of, node_text};
use crate::{CallEdge, CallType, Symbol, SymbolKind, SymbolsError};

pub struct PythonAnalyzer;

const DEF_QUERIES: &[(&str, SymbolKind)] = &[
    (r#"(function_definition name: (identifier) @name) @def"#, SymbolKind::Function),
    (r#"(class_definition name: (identifier) @name) @def"#, SymbolKind::Class),
];

impl LanguageAnalyzer for PythonAnalyzer {
    fn language(&self) -> &'static str {
        "python"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["py", "pyi"]
    }

    fn extract_symbols(&self, path: &Path, source: &[u8]) -> Result<Vec<Symbol>, SymbolsError> {
        let language = tree_sitter_python::language();
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

                let (kind, parent, qualified_name) = if *kind == SymbolKind::Function {
                    match enclosing_class(def_node, source) {
                        Some(p) => (SymbolKind::Method, Some(p.clone()), format!("{p}.{name}")),
                        None => (SymbolKind::Function, None, name.clone()),
                    }
                } else {
                    (*kind, None, name.clone())
                };

                let mut modifiers = Vec::new();
                if !name.starts_with('_') {
                    modifiers.push("public".to_string());
                }

                symbols.push(Symbol {
                    file_path: file_path.clone(),
                    kind,
                    qualified_name,
                    start_line,
                    end_line,
                    signature: first_line_signature(def_text),
                    doc: leading_doc_comment(text, start_line, &["#"]),
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
        let language = tree_sitter_python::language();
        let tree = util::parse(language, source)?;
        let root = tree.root_node();
        let file_path = path.to_string_lossy().replace('\\', "/");
        let mut edges = Vec::new();

        for (query_src, call_type) in [
            (r#"(call function: (identifier) @callee)"#, CallType::Direct),
            (
                r#"(call function: (attribute attribute: (identifier) @callee))"#,
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
        let language = tree_sitter_python::language();
        let tree = util::parse(language, source)?;
        let root = tree.root_node();
        let mut out = Vec::new();
        for query_src in [
            r#"(import_statement name: (dotted_name) @mod)"#,
            r#"(import_from_statement module_name: (dotted_name) @mod)"#,
        ] {
            let query = Query::new(language, query_src).map_err(|e| SymbolsError::Query(e.to_string()))?;
            let mut cursor = QueryCursor::new();
            for m in cursor.matches(&query, root, source) {
                for cap in m.captures {
                    out.push(node_text(source, (cap.node.start_byte(), cap.node.end_byte())).to_string());
                }
            }
        }
        Ok(out)
    }

    fn get_exports(&self, path: &Path, source: &[u8]) -> Result<Vec<String>, SymbolsError> {
        Ok(self
            .extract_symbols(path, source)?
            .into_iter()
            .filter(|s| s.is_exported() || s.modifiers.iter().any(|m| m == "public"))
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

fn enclosing_class(node: Node, source: &[u8]) -> Option<String> {
    let mut cur = node.parent();
    while let Some(n) = cur {
        if n.kind() == "class_definition" {
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

    const SRC: &str = "import os\n\nclass Greeter:\n    def hello(self):\n        return greet()\n\ndef greet():\n    return os.getcwd()\n";

    #[test]
    fn extracts_function_and_method() {
        let analyzer = PythonAnalyzer;
        let path = PathBuf::from("app.py");
        let symbols = analyzer.extract_symbols(&path, SRC.as_bytes()).unwrap();
        assert!(symbols.iter().any(|s| s.qualified_name == "greet" && s.kind == SymbolKind::Function));
        assert!(symbols.iter().any(|s| s.qualified_name == "Greeter.hello" && s.kind == SymbolKind::Method));
    }

    #[test]
    fn extracts_imports() {
        let analyzer = PythonAnalyzer;
        let imports = analyzer.get_imports(&PathBuf::from("app.py"), SRC.as_bytes()).unwrap();
        assert_eq!(imports, vec!["os"]);
    }
}
