use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Plain,
    Xml,
    Json,
    Markdown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackedFile {
    pub rel_path: String,
    pub content: String,
    pub token_estimate: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    pub files: Vec<String>,
    pub warnings: Vec<String>,
    pub language_breakdown: std::collections::BTreeMap<String, usize>,
    pub project_type: Option<String>,
}

/// Renders a chunk's files into the requested wire format. Deterministic:
/// the same files in the same order always produce byte-identical output.
pub fn render(format: Format, files: &[PackedFile]) -> String {
    match format {
        Format::Plain => render_plain(files),
        Format::Xml => render_xml(files),
        Format::Json => render_json(files, None),
        Format::Markdown => render_markdown(files),
    }
}

pub fn render_with_manifest(format: Format, files: &[PackedFile], manifest: Option<&Manifest>) -> String {
    match format {
        Format::Json => render_json(files, manifest),
        _ => render(format, files),
    }
}

fn render_plain(files: &[PackedFile]) -> String {
    let mut out = String::new();
    for f in files {
        out.push_str(&format!("--- File: {} ---\n", f.rel_path));
        out.push_str(&f.content);
        if !f.content.ends_with('\n') {
            out.push('\n');
        }
    }
    out
}

fn render_xml(files: &[PackedFile]) -> String {
    let mut out = String::from("<context>\n");
    for f in files {
        out.push_str(&format!("<file path=\"{}\"><content>", xml_escape(&f.rel_path)));
        out.push_str(&xml_escape(&f.content));
        out.push_str("</content></file>\n");
    }
    out.push_str("</context>\n");
    out
}

fn render_json(files: &[PackedFile], manifest: Option<&Manifest>) -> String {
    #[derive(Serialize)]
    struct JsonFile<'a> {
        path: &'a str,
        content: &'a str,
    }
    #[derive(Serialize)]
    struct JsonPack<'a> {
        files: Vec<JsonFile<'a>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        manifest: Option<&'a Manifest>,
    }
    let pack = JsonPack {
        files: files.iter().map(|f| JsonFile { path: &f.rel_path, content: &f.content }).collect(),
        manifest,
    };
    serde_json::to_string_pretty(&pack).unwrap_or_default()
}

fn render_markdown(files: &[PackedFile]) -> String {
    let mut out = String::new();
    for f in files {
        out.push_str(&format!("### `{}`\n\n", f.rel_path));
        let lang = f.rel_path.rsplit('.').next().unwrap_or("");
        out.push_str(&format!("```{lang}\n"));
        out.push_str(&f.content);
        if !f.content.ends_with('\n') {
            out.push('\n');
        }
        out.push_str("```\n\n");
    }
    out
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<PackedFile> {
        vec![PackedFile {
            rel_path: "src/lib.rs".to_string(),
            content: "fn main() {}".to_string(),
            token_estimate: 10,
        }]
    }

    #[test]
    fn plain_uses_file_separators() {
        let out = render(Format::Plain, &sample());
        assert!(out.starts_with("--- File: src/lib.rs ---\n"));
        assert!(out.contains("fn main() {}"));
    }

    #[test]
    fn xml_escapes_entities() {
        let files = vec![PackedFile {
            rel_path: "a.rs".to_string(),
            content: "if a < b && b > 0 {}".to_string(),
            token_estimate: 5,
        }];
        let out = render(Format::Xml, &files);
        assert!(out.contains("&lt;"));
        assert!(out.contains("&gt;"));
        assert!(out.contains("&amp;"));
    }

    #[test]
    fn json_round_trips_paths_and_content() {
        let out = render(Format::Json, &sample());
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["files"][0]["path"], "src/lib.rs");
        assert_eq!(parsed["files"][0]["content"], "fn main() {}");
    }

    #[test]
    fn rendering_is_deterministic() {
        let a = render(Format::Xml, &sample());
        let b = render(Format::Xml, &sample());
        assert_eq!(a, b);
    }
}
