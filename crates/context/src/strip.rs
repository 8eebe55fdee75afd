use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommentStyle {
    /// `//` line comments, `/* */` block comments, `"..."`/`'...'` strings.
    CLike,
    /// `#` line comments only, `"..."`/`'...'` strings (good enough for a
    /// best-effort pass; Python triple-quoted strings are left alone by
    /// treating `"""`/`'''` as an ordinary quote char run).
    Hash,
    None,
}

fn style_for(path: &Path) -> CommentStyle {
    match path.extension().and_then(|e| e.to_str()).unwrap_or("").to_lowercase().as_str() {
        "rs" | "ts" | "tsx" | "js" | "jsx" | "mjs" | "cjs" | "go" | "java" | "c" | "h" | "cpp" | "hpp" | "cs" => {
            CommentStyle::CLike
        }
        "py" | "pyi" | "rb" | "sh" | "bash" | "yaml" | "yml" => CommentStyle::Hash,
        _ => CommentStyle::None,
    }
}

/// Best-effort line/block comment stripper. Unregistered extensions pass
/// through unchanged rather than risk corrupting content the stripper
/// doesn't understand.
pub fn strip_comments(path: &Path, source: &str) -> String {
    match style_for(path) {
        CommentStyle::CLike => strip_c_like(source),
        CommentStyle::Hash => strip_hash(source),
        CommentStyle::None => source.to_string(),
    }
}

fn strip_c_like(source: &str) -> String {
    // Byte-level scanning with raw-byte copying (not `byte as char`, which
    // would mangle multi-byte UTF-8 sequences) — ASCII delimiters only need
    // to be recognized, everything else is passed through untouched.
    let bytes = source.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(source.len());
    let mut i = 0;
    let mut in_string: Option<u8> = None;

    while i < bytes.len() {
        let b = bytes[i];
        if let Some(quote) = in_string {
            out.push(b);
            if b == b'\\' && i + 1 < bytes.len() {
                out.push(bytes[i + 1]);
                i += 2;
                continue;
            }
            if b == quote {
                in_string = None;
            }
            i += 1;
            continue;
        }
        match b {
            b'"' | b'\'' => {
                in_string = Some(b);
                out.push(b);
                i += 1;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                    i += 1;
                }
                i = (i + 2).min(bytes.len());
            }
            _ => {
                out.push(b);
                i += 1;
            }
        }
    }
    drop_blank_runs(&String::from_utf8_lossy(&out))
}

fn strip_hash(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    for line in source.lines() {
        let mut in_string: Option<char> = None;
        let mut cut = line.len();
        let mut chars = line.char_indices().peekable();
        while let Some((idx, ch)) = chars.next() {
            if let Some(q) = in_string {
                if ch == '\\' {
                    chars.next();
                    continue;
                }
                if ch == q {
                    in_string = None;
                }
                continue;
            }
            match ch {
                '"' | '\'' => in_string = Some(ch),
                '#' => {
                    cut = idx;
                    break;
                }
                _ => {}
            }
        }
        out.push_str(line[..cut].trim_end());
        out.push('\n');
    }
    drop_blank_runs(&out)
}

/// Collapses runs of 3+ blank lines left behind by comment removal down to one.
fn drop_blank_runs(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;
    for line in text.lines() {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn strips_line_and_block_comments_preserving_strings() {
        let src = "let x = \"// not a comment\"; // real comment\n/* block\n   comment */\nlet y = 2;\n";
        let out = strip_comments(&PathBuf::from("a.rs"), src);
        assert!(out.contains("\"// not a comment\""));
        assert!(!out.contains("real comment"));
        assert!(!out.contains("block"));
        assert!(out.contains("let y = 2;"));
    }

    #[test]
    fn strips_hash_comments_preserving_strings() {
        let src = "x = \"#not a comment\"  # real comment\ny = 2\n";
        let out = strip_hash(src);
        assert!(out.contains("\"#not a comment\""));
        assert!(!out.contains("real comment"));
        assert!(out.contains("y = 2"));
    }

    #[test]
    fn unregistered_extension_passes_through() {
        let src = "# just text\n";
        assert_eq!(strip_comments(&PathBuf::from("a.unknownext"), src), src);
    }
}
