use std::collections::HashMap;

use tree_sitter::{Language, Node, Parser, Query, QueryCursor, Tree};

use crate::SymbolsError;

pub fn parse(language: Language, source: &[u8]) -> Result<Tree, SymbolsError> {
    let mut parser = Parser::new();
    parser
        .set_language(language)
        .map_err(|e| SymbolsError::Query(e.to_string()))?;
    let text = std::str::from_utf8(source).unwrap_or("");
    parser.parse(text, None).ok_or(SymbolsError::Parse {
        path: String::new(),
    })
}

pub fn node_text<'a>(source: &'a [u8], range: (usize, usize)) -> &'a str {
    std::str::from_utf8(&source[range.0..range.1]).unwrap_or("")
}

/// 1-based line number of a byte offset.
pub fn line_of(source: &[u8], byte: usize) -> usize {
    1 + source[..byte.min(source.len())].iter().filter(|&&b| b == b'\n').count()
}

/// Runs a tree-sitter query, returning one map of capture-name to byte-range
/// per match. Captures repeated within a match keep only the last occurrence,
/// which is fine for the single-definition-per-match queries used here.
pub fn run_query(
    query_src: &str,
    language: Language,
    root: Node,
    source: &[u8],
) -> Result<Vec<HashMap<String, (usize, usize)>>, SymbolsError> {
    let query = Query::new(language, query_src).map_err(|e| SymbolsError::Query(e.to_string()))?;
    let mut cursor = QueryCursor::new();
    let names = query.capture_names().to_vec();

    let mut out = Vec::new();
    for m in cursor.matches(&query, root, source) {
        let mut map = HashMap::new();
        for cap in m.captures {
            map.insert(names[cap.index as usize].clone(), (cap.node.start_byte(), cap.node.end_byte()));
        }
        out.push(map);
    }
    Ok(out)
}

/// First non-blank line of a definition's text, brace/colon-truncated and
/// whitespace-collapsed, used as a symbol's display signature.
pub fn first_line_signature(def_text: &str) -> String {
    let mut s = def_text;
    for cut in ['{', ':'] {
        if let Some(i) = s.find(cut) {
            // Don't cut on a colon inside a type position like `-> Foo:` for
            // Python; only treat a colon as a truncation point when it ends
            // the line (def ...:) — caller passes already-trimmed text where
            // this matters, so a plain find is acceptable here.
            if cut == '{' {
                s = &s[..i];
            }
        }
    }
    if let Some(i) = s.find('\n') {
        s = &s[..i];
    }
    let mut out = String::with_capacity(s.len().min(200));
    let mut prev_ws = false;
    for ch in s.chars() {
        let is_ws = ch.is_whitespace();
        if is_ws {
            if !prev_ws {
                out.push(' ');
            }
        } else {
            out.push(ch);
        }
        prev_ws = is_ws;
        if out.len() >= 240 {
            break;
        }
    }
    out.trim().trim_end_matches('{').trim().to_string()
}

/// Scans the lines immediately above `start_line` (1-based) for a contiguous
/// run of doc-comment lines, returning them joined if found.
pub fn leading_doc_comment(text: &str, start_line: usize, prefixes: &[&str]) -> Option<String> {
    let lines: Vec<&str> = text.lines().collect();
    if start_line < 2 {
        return None;
    }
    let mut doc_lines = Vec::new();
    let mut idx = start_line.saturating_sub(2);
    loop {
        let line = lines.get(idx)?.trim();
        let matched = prefixes.iter().find(|p| line.starts_with(**p));
        match matched {
            Some(p) => doc_lines.push(line[p.len()..].trim().to_string()),
            None => break,
        }
        if idx == 0 {
            break;
        }
        idx -= 1;
    }
    if doc_lines.is_empty() {
        return None;
    }
    doc_lines.reverse();
    Some(doc_lines.join("\n"))
}
