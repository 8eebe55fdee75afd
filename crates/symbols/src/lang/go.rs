use std::path::Path;

use tree_sitter::{Node, Query, QueryCursor};

use crate::registry::LanguageAnalyzer;
use crate::util::{self, first_line_signature, leading_doc_comment, line_of, node_text};
use crate::{CallEdge, CallType, Symbol, SymbolKind, SymbolsError};

pub struct GoAnalyzer;

impl LanguageAnalyzer for GoAnalyzer {
    fn language(&self) -> &'static str {
        "go"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["go"]
    }

    fn extract_symbols(&self, path: &Path, source: &[u8]) -> Result<Vec<Symbol>, SymbolsError> {
        let language = tree_sitter_go::language();
        let tree = util::parse(language, source)?;
        let root = tree.root_node();
        let text = std::str::from_utf8(source).unwrap_or("");
        let file_path = path.to_string_lossy().replace('\\', "/");

        let mut symbols = Vec::new();
        symbols.extend(extract_funcs(source, root, language, &file_path, text)?);
        symbols.extend(extract_methods(source, root, language, &file_path, text)?);
        symbols.extend(extract_types(
            source,
            root,
            language,
            &file_path,
            text,
            r#"(type_declaration (type_spec name: (type_identifier) @name type: (struct_type)) @def)"#,
            SymbolKind::Struct,
        )?);
        symbols.extend(extract_types(
            source,
            root,
            language,
            &file_path,
            text,
            r#"(type_declaration (type_spec name: (type_identifier) @name type: (interface_type)) @def)"#,
            SymbolKind::Interface,
        )?);
        symbols.sort_by_key(|s| s.start_line);
        Ok(symbols)
    }

    fn extract_calls(
        &self,
        path: &Path,
        source: &[u8],
        symbols: &[Symbol],
    ) -> Result<Vec<CallEdge>, SymbolsError> {
        let language = tree_sitter_go::language();
        let tree = util::parse(language, source)?;
        let root = tree.root_node();
        let file_path = path.to_string_lossy().replace('\\', "/");
        let mut edges = Vec::new();

        for (query_src, call_type) in [
            (r#"(call_expression function: (identifier) @callee)"#, CallType::Direct),
            (
                r#"(call_expression function: (selector_expression field: (field_identifier) @callee))"#,
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
        let language = tree_sitter_go::language();
        let tree = util::parse(language, source)?;
        let root = tree.root_node();
        let query = Query::new(language, r#"(import_spec path: (interpreted_string_literal) @path)"#)
            .map_err(|e| SymbolsError::Query(e.to_string()))?;
        let mut cursor = QueryCursor::new();
        let mut out = Vec::new();
        for m in cursor.matches(&query, root, source) {
            for cap in m.captures {
                let raw = node_text(source, (cap.node.start_byte(), cap.node.end_byte()));
                out.push(raw.trim_matches('"').to_string());
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

fn is_go_exported(name: &str) -> bool {
    name.chars().next().map(|c| c.is_uppercase()).unwrap_or(false)
}

fn extract_funcs(
    source: &[u8],
    root: Node,
    language: tree_sitter::Language,
    file_path: &str,
    text: &str,
) -> Result<Vec<Symbol>, SymbolsError> {
    let query = Query::new(language, r#"(function_declaration name: (identifier) @name) @def"#)
        .map_err(|e| SymbolsError::Query(e.to_string()))?;
    let mut cursor = QueryCursor::new();
    let mut out = Vec::new();
    for m in cursor.matches(&query, root, source) {
        let mut name_node = None;
        let mut def_node = None;
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
        out.push(Symbol {
            file_path: file_path.to_string(),
            kind: SymbolKind::Function,
            qualified_name: name.clone(),
            start_line,
            end_line: line_of(source, def_node.end_byte()),
            signature: first_line_signature(def_text),
            doc: leading_doc_comment(text, start_line, &["//"]),
            parent: None,
            modifiers: if is_go_exported(&name) { vec!["exported".to_string()] } else { vec![] },
        });
    }
    Ok(out)
}

fn extract_methods(
    source: &[u8],
    root: Node,
    language: tree_sitter::Language,
    file_path: &str,
    text: &str,
) -> Result<Vec<Symbol>, SymbolsError> {
    let query = Query::new(
        language,
        r#"(method_declaration
             receiver: (parameter_list (parameter_declaration type: (_) @recv))
             name: (field_identifier) @name) @def"#,
    )
    .map_err(|e| SymbolsError::Query(e.to_string()))?;
    let mut cursor = QueryCursor::new();
    let mut out = Vec::new();
    for m in cursor.matches(&query, root, source) {
        let mut name_node = None;
        let mut def_node = None;
        let mut recv_node = None;
        for cap in m.captures {
            match query.capture_names()[cap.index as usize].as_str() {
                "name" => name_node = Some(cap.node),
                "def" => def_node = Some(cap.node),
                "recv" => recv_node = Some(cap.node),
                _ => {}
            }
        }
        let (Some(name_node), Some(def_node), Some(recv_node)) = (name_node, def_node, recv_node) else {
            continue;
        };
        let name = node_text(source, (name_node.start_byte(), name_node.end_byte())).to_string();
        let recv = node_text(source, (recv_node.start_byte(), recv_node.end_byte()))
            .trim_start_matches('*')
            .to_string();
        let def_text = node_text(source, (def_node.start_byte(), def_node.end_byte()));
        let start_line = line_of(source, def_node.start_byte());
        out.push(Symbol {
            file_path: file_path.to_string(),
            kind: SymbolKind::Method,
            qualified_name: format!("{recv}.{name}"),
            start_line,
            end_line: line_of(source, def_node.end_byte()),
            signature: first_line_signature(def_text),
            doc: leading_doc_comment(text, start_line, &["//"]),
            parent: Some(recv),
            modifiers: if is_go_exported(&name) { vec!["exported".to_string()] } else { vec![] },
        });
    }
    Ok(out)
}

fn extract_types(
    source: &[u8],
    root: Node,
    language: tree_sitter::Language,
    file_path: &str,
    text: &str,
    query_src: &str,
    kind: SymbolKind,
) -> Result<Vec<Symbol>, SymbolsError> {
    let query = Query::new(language, query_src).map_err(|e| SymbolsError::Query(e.to_string()))?;
    let mut cursor = QueryCursor::new();
    let mut out = Vec::new();
    for m in cursor.matches(&query, root, source) {
        let mut name_node = None;
        let mut def_node = None;
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
        out.push(Symbol {
            file_path: file_path.to_string(),
            kind,
            qualified_name: name.clone(),
            start_line,
            end_line: line_of(source, def_node.end_byte()),
            signature: first_line_signature(def_text),
            doc: leading_doc_comment(text, start_line, &["//"]),
            parent: None,
            modifiers: if is_go_exported(&name) { vec!["exported".to_string()] } else { vec![] },
        });
    }
    Ok(out)
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

    const SRC: &str = "package main\n\nimport \"fmt\"\n\ntype Counter struct {\n\tValue int\n}\n\nfunc (c *Counter) Increment() {\n\tAdd(c.Value, 1)\n}\n\nfunc Add(a int, b int) int {\n\tfmt.Println(a)\n\treturn a + b\n}\n";

    #[test]
    fn extracts_struct_function_and_method() {
        let analyzer = GoAnalyzer;
        let path = PathBuf::from("main.go");
        let symbols = analyzer.extract_symbols(&path, SRC.as_bytes()).unwrap();
        assert!(symbols.iter().any(|s| s.qualified_name == "Counter" && s.kind == SymbolKind::Struct));
        assert!(symbols.iter().any(|s| s.qualified_name == "Add" && s.kind == SymbolKind::Function));
        assert!(symbols.iter().any(|s| s.qualified_name == "Counter.Increment" && s.kind == SymbolKind::Method));
    }

    #[test]
    fn extracts_imports() {
        let analyzer = GoAnalyzer;
        let imports = analyzer.get_imports(&PathBuf::from("main.go"), SRC.as_bytes()).unwrap();
        assert_eq!(imports, vec!["fmt"]);
    }
}
