use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use forge_events::{EventBus, Payload};
use forge_symbols::{LanguageAnalyzer, LanguageRegistry};

use crate::format::{render_with_manifest, Format, Manifest, PackedFile};
use crate::strip::strip_comments;
use crate::tokens::{self, TokenProfile, TokenProfileRegistry};

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("estimated context size {estimated} exceeds maxTokens {max}")]
    ContextTooLarge { estimated: usize, max: usize },
    #[error("selection resolved to zero readable files")]
    NoFiles,
    #[error(transparent)]
    Tree(#[from] forge_tree::TreeError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitStrategy {
    Smart,
    PerFile,
    PerTokenBudget,
}

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub format: Format,
    pub max_tokens: usize,
    pub strip_comments: bool,
    pub include_manifest: bool,
    pub split_strategy: SplitStrategy,
    pub overlap_tokens: usize,
    pub use_streaming: bool,
    pub model_profile: String,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            format: Format::Plain,
            max_tokens: 100_000,
            strip_comments: false,
            include_manifest: true,
            split_strategy: SplitStrategy::Smart,
            overlap_tokens: 0,
            use_streaming: false,
            model_profile: "default".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ContextPack {
    pub format: Format,
    pub files: Vec<PackedFile>,
    pub manifest: Option<Manifest>,
    pub oversize: bool,
}

impl ContextPack {
    pub fn total_tokens(&self) -> usize {
        self.files.iter().map(|f| f.token_estimate).sum()
    }

    pub fn render(&self) -> String {
        render_with_manifest(self.format, &self.files, self.manifest.as_ref())
    }
}

#[derive(Debug, Clone)]
pub struct Chunk {
    pub index: usize,
    pub files: Vec<PackedFile>,
}

impl Chunk {
    pub fn total_tokens(&self) -> usize {
        self.files.iter().map(|f| f.token_estimate).sum()
    }

    pub fn render(&self, format: Format) -> String {
        crate::format::render(format, &self.files)
    }
}

pub enum BuildOutcome {
    Pack(ContextPack),
    Stream(StreamHandle),
}

/// `Build(root, selection, options) -> ContextPack | StreamHandle`.
///
/// Selection entries are resolved against a fresh tree walk (directories
/// expand to every descendant file); a file's byte size stands in for its
/// character count when deciding whether the pack fits, so the accept/reject
/// call is made without reading file bodies. Only once a pack is known to
/// fit are bodies actually read into memory; an oversize selection hands
/// back a [`StreamHandle`] that reads and strips each chunk's files lazily.
///
/// `events`, when given, receives a `context.progress` publish per file read
/// (Pack path) or per chunk drained (Stream path) — the reactive-progress
/// channel callers subscribe to instead of passing a callback through this
/// call.
pub fn build(root: &Path, selection: &[PathBuf], options: BuildOptions, events: Option<Arc<EventBus>>) -> Result<BuildOutcome, ContextError> {
    let profile = TokenProfileRegistry::default().get(&options.model_profile);
    let resolved = resolve_selection(root, selection)?;
    if resolved.is_empty() {
        return Err(ContextError::NoFiles);
    }

    let mut estimated_total = 0usize;
    for (_, abs) in &resolved {
        let size = std::fs::metadata(abs).map(|m| m.len() as usize).unwrap_or(0);
        estimated_total += size.div_ceil(profile.chars_per_token.max(1)) + profile.safety_buffer;
    }

    if estimated_total <= options.max_tokens {
        let (files, warnings) = read_all(&resolved, &options, profile, events.as_deref());
        if files.is_empty() {
            return Err(ContextError::NoFiles);
        }
        let manifest = options.include_manifest.then(|| build_manifest(root, &files, warnings));
        return Ok(BuildOutcome::Pack(ContextPack {
            format: options.format,
            files,
            manifest,
            oversize: false,
        }));
    }

    if !options.use_streaming {
        return Err(ContextError::ContextTooLarge {
            estimated: estimated_total,
            max: options.max_tokens,
        });
    }

    Ok(BuildOutcome::Stream(StreamHandle::new(resolved, options, profile, events)))
}

fn read_all(
    resolved: &[(String, PathBuf)],
    options: &BuildOptions,
    profile: TokenProfile,
    events: Option<&EventBus>,
) -> (Vec<PackedFile>, Vec<String>) {
    let mut files = Vec::with_capacity(resolved.len());
    let mut warnings = Vec::new();
    let total = resolved.len();
    for (current, (rel_path, abs_path)) in resolved.iter().enumerate() {
        match std::fs::read_to_string(abs_path) {
            Ok(content) => {
                let content = if options.strip_comments {
                    strip_comments(Path::new(rel_path), &content)
                } else {
                    content
                };
                let token_estimate = tokens::estimate(&content, profile);
                files.push(PackedFile {
                    rel_path: rel_path.clone(),
                    content,
                    token_estimate,
                });
            }
            Err(e) => warnings.push(format!("{rel_path}: {e}")),
        }
        if let Some(bus) = events {
            bus.publish(Payload::ContextProgress { current: current + 1, total });
        }
    }
    (files, warnings)
}

fn build_manifest(root: &Path, files: &[PackedFile], warnings: Vec<String>) -> Manifest {
    let mut language_breakdown = BTreeMap::new();
    for f in files {
        *language_breakdown.entry(lang_of(&f.rel_path)).or_insert(0) += 1;
    }
    Manifest {
        files: files.iter().map(|f| f.rel_path.clone()).collect(),
        warnings,
        language_breakdown,
        project_type: detect_project_type(root),
    }
}

fn lang_of(rel_path: &str) -> String {
    Path::new(rel_path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("unknown")
        .to_lowercase()
}

fn detect_project_type(root: &Path) -> Option<String> {
    let markers: &[(&str, &str)] = &[
        ("Cargo.toml", "rust"),
        ("package.json", "node"),
        ("go.mod", "go"),
        ("pyproject.toml", "python"),
        ("requirements.txt", "python"),
    ];
    markers
        .iter()
        .find(|(marker, _)| root.join(marker).is_file())
        .map(|(_, kind)| kind.to_string())
}

fn resolve_selection(root: &Path, selection: &[PathBuf]) -> Result<Vec<(String, PathBuf)>, forge_tree::TreeError> {
    let scan = forge_tree::build_tree(root, &forge_tree::TreeOptions::default())?;
    let mut out = Vec::new();
    let selection_rel: Vec<String> = selection
        .iter()
        .map(|p| p.to_string_lossy().replace('\\', "/").trim_end_matches('/').to_string())
        .collect();

    for node in scan.root.iter_files() {
        if node.oversize {
            continue;
        }
        let matches = selection_rel
            .iter()
            .any(|s| node.rel_path == *s || node.rel_path.starts_with(&format!("{s}/")));
        if matches {
            out.push((node.rel_path.clone(), node.abs_path.clone()));
        }
    }
    out.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(out)
}

/// `StreamHandle`: lazy chunk iterator over an oversize selection. Holds at
/// most one chunk's worth of file bodies plus the unread `(relPath, absPath)`
/// list — the bound the contract calls for.
enum PendingEntry {
    Unread(String, PathBuf),
    Ready(PackedFile),
}

pub struct StreamHandle {
    remaining: std::collections::VecDeque<PendingEntry>,
    options: BuildOptions,
    profile: TokenProfile,
    next_index: usize,
    symbol_registry: LanguageRegistry,
    warnings: Vec<String>,
    events: Option<Arc<EventBus>>,
    total: usize,
    drained: usize,
}

impl StreamHandle {
    fn new(resolved: Vec<(String, PathBuf)>, options: BuildOptions, profile: TokenProfile, events: Option<Arc<EventBus>>) -> Self {
        let total = resolved.len();
        Self {
            remaining: resolved.into_iter().map(|(rel, abs)| PendingEntry::Unread(rel, abs)).collect(),
            options,
            profile,
            next_index: 0,
            symbol_registry: LanguageRegistry::with_defaults(),
            warnings: Vec::new(),
            events,
            total,
            drained: 0,
        }
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Pulls the next chunk, or `None` once the selection is exhausted.
    pub fn next(&mut self) -> Option<Chunk> {
        if self.remaining.is_empty() {
            return None;
        }

        let chunk_files = match self.options.split_strategy {
            SplitStrategy::PerFile => self.next_per_file(),
            SplitStrategy::Smart => self.next_smart(),
            SplitStrategy::PerTokenBudget => self.next_per_token_budget(),
        };

        if chunk_files.is_empty() {
            return None;
        }
        self.drained += chunk_files.len();
        if let Some(bus) = &self.events {
            bus.publish(Payload::ContextProgress { current: self.drained.min(self.total), total: self.total });
        }
        let chunk = Chunk {
            index: self.next_index,
            files: chunk_files,
        };
        self.next_index += 1;
        Some(chunk)
    }

    fn read_one(&mut self) -> Option<PackedFile> {
        loop {
            match self.remaining.pop_front()? {
                PendingEntry::Ready(file) => return Some(file),
                PendingEntry::Unread(rel_path, abs_path) => match std::fs::read_to_string(&abs_path) {
                    Ok(content) => {
                        let content = if self.options.strip_comments {
                            strip_comments(Path::new(&rel_path), &content)
                        } else {
                            content
                        };
                        let token_estimate = tokens::estimate(&content, self.profile);
                        return Some(PackedFile {
                            rel_path,
                            content,
                            token_estimate,
                        });
                    }
                    Err(e) => self.warnings.push(format!("{rel_path}: {e}")),
                },
            }
        }
    }

    fn next_per_file(&mut self) -> Vec<PackedFile> {
        self.read_one().into_iter().collect()
    }

    /// Greedy-fills a chunk up to `max_tokens`; a single file exceeding the
    /// budget is split at top-level declaration boundaries reported by the
    /// Symbol Index rather than mid-body.
    fn next_smart(&mut self) -> Vec<PackedFile> {
        let mut chunk = Vec::new();
        let mut total = 0usize;
        while total < self.options.max_tokens {
            let Some(file) = self.read_one() else { break };
            if file.token_estimate > self.options.max_tokens {
                let pieces = self.split_at_declarations(&file);
                if let Some((first, rest)) = pieces.split_first() {
                    chunk.push(first.clone());
                    total += first.token_estimate;
                    for piece in rest.iter().rev() {
                        self.remaining.push_front(PendingEntry::Ready(piece.clone()));
                    }
                }
                break;
            } else if total + file.token_estimate > self.options.max_tokens && !chunk.is_empty() {
                self.remaining.push_front(PendingEntry::Ready(file));
                break;
            } else {
                total += file.token_estimate;
                chunk.push(file);
            }
        }
        chunk
    }

    fn next_per_token_budget(&mut self) -> Vec<PackedFile> {
        let mut chunk = Vec::new();
        let mut total = 0usize;
        let mut carry: Option<String> = None;
        while total < self.options.max_tokens {
            let Some(mut file) = self.read_one() else { break };
            if let Some(tail) = carry.take() {
                file.content = format!("{tail}{}", file.content);
                file.token_estimate = tokens::estimate(&file.content, self.profile);
            }
            if total + file.token_estimate > self.options.max_tokens && !chunk.is_empty() {
                let tail_chars = self.options.overlap_tokens * self.profile.chars_per_token.max(1);
                carry = Some(tail_of(&file.content, tail_chars));
                self.remaining.push_front(PendingEntry::Ready(file));
                break;
            }
            total += file.token_estimate;
            chunk.push(file);
        }
        chunk
    }

    fn split_at_declarations(&self, file: &PackedFile) -> Vec<PackedFile> {
        let Some(analyzer) = self.symbol_registry.for_path(Path::new(&file.rel_path)) else {
            return vec![file.clone()];
        };
        let Ok(symbols) = analyzer.extract_symbols(Path::new(&file.rel_path), file.content.as_bytes()) else {
            return vec![file.clone()];
        };
        let mut boundaries: Vec<usize> = symbols
            .iter()
            .filter(|s| s.parent.is_none())
            .map(|s| s.start_line)
            .collect();
        boundaries.sort_unstable();
        boundaries.dedup();
        if boundaries.is_empty() {
            return vec![file.clone()];
        }

        let lines: Vec<&str> = file.content.lines().collect();
        let mut pieces = Vec::new();
        for (i, &start) in boundaries.iter().enumerate() {
            let end = boundaries.get(i + 1).copied().unwrap_or(lines.len() + 1);
            let start_idx = start.saturating_sub(1).min(lines.len());
            let end_idx = (end.saturating_sub(1)).min(lines.len());
            if start_idx >= end_idx {
                continue;
            }
            let content = lines[start_idx..end_idx].join("\n");
            let token_estimate = tokens::estimate(&content, self.profile);
            pieces.push(PackedFile {
                rel_path: format!("{}#{}", file.rel_path, i),
                content,
                token_estimate,
            });
        }
        if pieces.is_empty() {
            vec![file.clone()]
        } else {
            pieces
        }
    }
}

fn tail_of(text: &str, chars: usize) -> String {
    if chars == 0 {
        return String::new();
    }
    let total = text.chars().count();
    let skip = total.saturating_sub(chars);
    text.chars().skip(skip).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/a.rs"), "fn a() { 1 }\n").unwrap();
        fs::write(dir.path().join("src/b.rs"), "fn b() { 2 }\n").unwrap();
        dir
    }

    #[test]
    fn build_returns_pack_when_under_budget() {
        let dir = fixture();
        let options = BuildOptions {
            max_tokens: 100_000,
            ..Default::default()
        };
        let outcome = build(dir.path(), &[PathBuf::from("src")], options, None).unwrap();
        match outcome {
            BuildOutcome::Pack(pack) => {
                assert_eq!(pack.files.len(), 2);
                assert!(!pack.oversize);
            }
            BuildOutcome::Stream(_) => panic!("expected a materialized pack"),
        }
    }

    #[test]
    fn build_errors_when_oversize_and_not_streaming() {
        let dir = fixture();
        let options = BuildOptions {
            max_tokens: 1,
            use_streaming: false,
            ..Default::default()
        };
        let err = build(dir.path(), &[PathBuf::from("src")], options, None).unwrap_err();
        assert!(matches!(err, ContextError::ContextTooLarge { .. }));
    }

    #[test]
    fn build_streams_per_file_when_oversize() {
        let dir = fixture();
        let options = BuildOptions {
            max_tokens: 1,
            use_streaming: true,
            split_strategy: SplitStrategy::PerFile,
            ..Default::default()
        };
        let outcome = build(dir.path(), &[PathBuf::from("src")], options, None).unwrap();
        let BuildOutcome::Stream(mut stream) = outcome else {
            panic!("expected a stream handle");
        };
        let mut seen = Vec::new();
        while let Some(chunk) = stream.next() {
            assert_eq!(chunk.files.len(), 1);
            seen.push(chunk.files[0].rel_path.clone());
        }
        seen.sort();
        assert_eq!(seen, vec!["src/a.rs", "src/b.rs"]);
    }

    #[test]
    fn rendering_pack_is_deterministic_for_same_selection() {
        let dir = fixture();
        let options = BuildOptions::default();
        let a = build(dir.path(), &[PathBuf::from("src")], options.clone(), None).unwrap();
        let b = build(dir.path(), &[PathBuf::from("src")], options, None).unwrap();
        let (BuildOutcome::Pack(a), BuildOutcome::Pack(b)) = (a, b) else {
            panic!("expected packs");
        };
        assert_eq!(a.render(), b.render());
    }
}
