use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::registry::LanguageRegistry;
use crate::{CallEdge, Symbol, SymbolKind, SymbolsError};

struct FileEntry {
    content_hash: u64,
    symbols: Vec<Symbol>,
    calls: Vec<CallEdge>,
}

/// `Index(root)` / `Query` / `CallersOf` / `DependenciesOf`: an in-memory,
/// per-file-content-hash-gated symbol and call graph over a source tree.
/// Re-indexing a file whose bytes are unchanged since the last pass is a
/// no-op; everything else about the public surface is a thin read API over
/// the accumulated [`Symbol`]/[`CallEdge`] sets.
pub struct SymbolIndex {
    root: PathBuf,
    registry: LanguageRegistry,
    files: HashMap<String, FileEntry>,
}

impl SymbolIndex {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            registry: LanguageRegistry::with_defaults(),
            files: HashMap::new(),
        }
    }

    /// Walks `root` (honoring the same ignore layers as the tree builder) and
    /// (re-)indexes every file whose extension has a registered analyzer.
    /// Returns the number of files actually re-parsed.
    pub fn index(&mut self) -> Result<usize, SymbolsError> {
        let scan = forge_tree::build_tree(&self.root, &forge_tree::TreeOptions::default())
            .map_err(|e| SymbolsError::Parse { path: e.to_string() })?;

        let mut reparsed = 0;
        let mut seen = std::collections::HashSet::new();
        for node in scan.root.iter_files() {
            if node.oversize {
                continue;
            }
            let Some(analyzer) = self.registry.for_path(Path::new(&node.rel_path)) else {
                continue;
            };
            let Ok(bytes) = std::fs::read(&node.abs_path) else {
                continue;
            };
            seen.insert(node.rel_path.clone());
            let hash = xxhash_rust::xxh3::xxh3_64(&bytes);
            if let Some(existing) = self.files.get(&node.rel_path) {
                if existing.content_hash == hash {
                    continue;
                }
            }

            let rel_path = Path::new(&node.rel_path);
            let symbols = analyzer.extract_symbols(rel_path, &bytes)?;
            let calls = analyzer.extract_calls(rel_path, &bytes, &symbols)?;
            debug!(file = %node.rel_path, symbols = symbols.len(), calls = calls.len(), "reindexed file");
            self.files.insert(
                node.rel_path.clone(),
                FileEntry {
                    content_hash: hash,
                    symbols,
                    calls,
                },
            );
            reparsed += 1;
        }

        self.files.retain(|path, _| seen.contains(path));
        Ok(reparsed)
    }

    pub fn symbol_count(&self) -> usize {
        self.files.values().map(|f| f.symbols.len()).sum()
    }

    /// Symbols declared directly in `rel_path`, or an empty slice if the
    /// file isn't indexed.
    pub fn symbols_in_file(&self, rel_path: &str) -> &[Symbol] {
        self.files.get(rel_path).map(|f| f.symbols.as_slice()).unwrap_or(&[])
    }

    /// `Query(name, kind?)`: substring match against `qualifiedName`,
    /// optionally narrowed by kind.
    pub fn query(&self, name: &str, kind: Option<SymbolKind>) -> Vec<&Symbol> {
        self.files
            .values()
            .flat_map(|f| &f.symbols)
            .filter(|s| s.qualified_name.contains(name))
            .filter(|s| kind.map(|k| k == s.kind).unwrap_or(true))
            .collect()
    }

    /// `CallersOf(symbolId)`: every call edge whose callee name matches the
    /// target symbol's own name (qualified or bare), reported with the
    /// caller's id.
    pub fn callers_of(&self, symbol_id: &str) -> Vec<&CallEdge> {
        let Some(target) = self.symbol_by_id(symbol_id) else {
            return Vec::new();
        };
        let bare_name = target.qualified_name.rsplit(['.', ':']).next().unwrap_or(&target.qualified_name);
        self.files
            .values()
            .flat_map(|f| &f.calls)
            .filter(|c| c.callee_name == bare_name || c.callee_name == target.qualified_name)
            .collect()
    }

    /// `DependenciesOf(symbolId, maxDepth)`: symbol ids reachable by
    /// following outgoing call edges up to `max_depth` hops, breadth-first.
    /// Edges whose callee name doesn't resolve to an indexed symbol are
    /// dropped rather than terminating the walk.
    pub fn dependencies_of(&self, symbol_id: &str, max_depth: usize) -> Vec<String> {
        let mut visited = std::collections::HashSet::new();
        let mut frontier = vec![symbol_id.to_string()];
        visited.insert(symbol_id.to_string());

        for _ in 0..max_depth {
            let mut next = Vec::new();
            for id in &frontier {
                let Some(sym) = self.symbol_by_id(id) else { continue };
                let callees = self
                    .files
                    .values()
                    .flat_map(|f| &f.calls)
                    .filter(|c| c.caller_symbol_id == sym.id())
                    .filter_map(|c| self.resolve_callee(&c.callee_name));
                for callee_id in callees {
                    if visited.insert(callee_id.clone()) {
                        next.push(callee_id);
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }

        visited.remove(symbol_id);
        visited.into_iter().collect()
    }

    fn symbol_by_id(&self, id: &str) -> Option<&Symbol> {
        self.files.values().flat_map(|f| &f.symbols).find(|s| s.id() == id)
    }

    fn resolve_callee(&self, callee_name: &str) -> Option<String> {
        self.files
            .values()
            .flat_map(|f| &f.symbols)
            .find(|s| s.qualified_name == callee_name || s.qualified_name.ends_with(&format!(".{callee_name}")) || s.qualified_name.ends_with(&format!("::{callee_name}")))
            .map(|s| s.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("lib.rs"),
            "pub fn add(a: i32, b: i32) -> i32 { a + b }\n\npub fn sum_all(xs: &[i32]) -> i32 {\n    let mut total = 0;\n    for x in xs { total = add(total, *x); }\n    total\n}\n",
        )
        .unwrap();
        dir
    }

    #[test]
    fn indexes_and_queries_symbols() {
        let dir = fixture();
        let mut index = SymbolIndex::new(dir.path());
        let reparsed = index.index().unwrap();
        assert_eq!(reparsed, 1);
        assert_eq!(index.symbol_count(), 2);

        let found = index.query("add", None);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].qualified_name, "add");
    }

    #[test]
    fn reindex_skips_unchanged_file() {
        let dir = fixture();
        let mut index = SymbolIndex::new(dir.path());
        assert_eq!(index.index().unwrap(), 1);
        assert_eq!(index.index().unwrap(), 0, "unchanged content should not be reparsed");
    }

    #[test]
    fn callers_and_dependencies_follow_call_edges() {
        let dir = fixture();
        let mut index = SymbolIndex::new(dir.path());
        index.index().unwrap();

        let add = index.query("add", None).into_iter().find(|s| s.qualified_name == "add").unwrap();
        let callers = index.callers_of(&add.id());
        assert!(callers.iter().any(|c| c.callee_name == "add"));

        let sum_all = index.query("sum_all", None)[0];
        let deps = index.dependencies_of(&sum_all.id(), 2);
        assert!(deps.contains(&add.id()));
    }
}
