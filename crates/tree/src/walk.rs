use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use tracing::warn;

use crate::{FileNode, IgnoreLayers, ScanResult, TreeError, MAX_DEPTH, MAX_FILES};

#[derive(Debug, Clone)]
pub struct TreeOptions {
    pub use_gitignore: bool,
    pub use_custom_ignore: bool,
    pub workspace_ignore_rules: Vec<String>,
    pub user_ignore_rules: Vec<String>,
    pub max_file_size: u64,
    pub allow_hidden: Vec<String>,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            use_gitignore: true,
            use_custom_ignore: true,
            workspace_ignore_rules: Vec::new(),
            user_ignore_rules: Vec::new(),
            max_file_size: crate::DEFAULT_MAX_FILE_SIZE,
            allow_hidden: Vec::new(),
        }
    }
}

/// `BuildTree(root, useGitignore, useCustomIgnore) -> FileNode`.
///
/// Depth-first; symlinks are listed but not descended into (cycle
/// prevention); hidden directories are skipped unless allow-listed; oversize
/// files are flagged, not excluded from the tree itself (only from context
/// packing, which is `forge-context`'s concern).
pub fn build_tree(root: &Path, opts: &TreeOptions) -> Result<ScanResult, TreeError> {
    if !root.is_dir() {
        return Err(TreeError::ErrPath(root.to_path_buf()));
    }

    let layers = if opts.use_custom_ignore {
        IgnoreLayers::build(
            root,
            &opts.workspace_ignore_rules,
            &opts.user_ignore_rules,
        )
        .unwrap_or_else(|e| {
            warn!("failed to compile custom ignore rules: {e}");
            IgnoreLayers::empty()
        })
    } else {
        IgnoreLayers::empty()
    };

    let mut builder = WalkBuilder::new(root);
    builder
        .hidden(true)
        .follow_links(false)
        .git_ignore(opts.use_gitignore)
        .git_exclude(opts.use_gitignore)
        .git_global(opts.use_gitignore)
        .ignore(opts.use_gitignore)
        // Walk one level past the cap so entries living exactly at MAX_DEPTH + 1
        // are observed (and can flag `truncated`) instead of silently vanishing.
        .max_depth(Some(MAX_DEPTH + 1))
        .sort_by_file_path(|a, b| a.cmp(b));

    let mut entries: Vec<(PathBuf, bool, bool, u64)> = Vec::new();
    let mut truncated = false;
    let mut visited = 0usize;

    for result in builder.build() {
        let entry = match result {
            Ok(e) => e,
            Err(e) => {
                warn!("walk error: {e}");
                continue;
            }
        };
        let path = entry.path();
        if path == root {
            continue;
        }

        let rel = path.strip_prefix(root).unwrap_or(path);
        let rel_str = normalize(rel);

        if entry.depth() > MAX_DEPTH {
            truncated = true;
            continue;
        }

        if is_hidden_component(&rel_str) && !opts.allow_hidden.iter().any(|a| a == &rel_str) {
            continue;
        }

        if layers.is_ignored(&rel_str, entry.file_type().map(|t| t.is_dir()).unwrap_or(false)) {
            continue;
        }

        let file_type = entry.file_type();
        let is_symlink = file_type.map(|t| t.is_symlink()).unwrap_or(false);
        let is_dir = file_type.map(|t| t.is_dir()).unwrap_or(false) && !is_symlink;
        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);

        visited += 1;
        if visited > MAX_FILES {
            truncated = true;
            break;
        }

        entries.push((path.to_path_buf(), is_dir, is_symlink, size));
    }

    let root_node = assemble(root, &entries, opts.max_file_size);
    Ok(ScanResult {
        root: root_node,
        truncated,
        files_visited: visited,
    })
}

fn is_hidden_component(rel: &str) -> bool {
    rel.split('/').any(|c| c.starts_with('.') && c != ".")
}

fn normalize(p: &Path) -> String {
    p.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Assembles the flat, sorted walk entries into a nested [`FileNode`] tree.
fn assemble(root: &Path, entries: &[(PathBuf, bool, bool, u64)], max_file_size: u64) -> FileNode {
    #[derive(Default)]
    struct Builder {
        children: BTreeMap<String, Builder>,
        is_dir: bool,
        is_symlink: bool,
        size: u64,
        abs_path: PathBuf,
    }

    let mut top = Builder {
        is_dir: true,
        abs_path: root.to_path_buf(),
        ..Default::default()
    };

    for (path, is_dir, is_symlink, size) in entries {
        let rel = path.strip_prefix(root).unwrap_or(path);
        let mut cursor = &mut top;
        let comps: Vec<_> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        for (i, comp) in comps.iter().enumerate() {
            let is_last = i == comps.len() - 1;
            let entry = cursor.children.entry(comp.clone()).or_default();
            if is_last {
                entry.is_dir = *is_dir;
                entry.is_symlink = *is_symlink;
                entry.size = *size;
                entry.abs_path = path.clone();
            } else {
                entry.is_dir = true;
            }
            cursor = entry;
        }
    }

    fn into_node(name: String, rel_prefix: &str, b: Builder, max_file_size: u64) -> FileNode {
        let rel_path = if rel_prefix.is_empty() {
            name.clone()
        } else {
            format!("{rel_prefix}/{name}")
        };
        let mut children: Vec<FileNode> = b
            .children
            .into_iter()
            .map(|(cname, cb)| into_node(cname, &rel_path, cb, max_file_size))
            .collect();
        children.sort_by(|a, b| a.name.cmp(&b.name));
        FileNode {
            abs_path: b.abs_path,
            rel_path,
            name,
            is_dir: b.is_dir,
            is_symlink: b.is_symlink,
            size: b.size,
            oversize: !b.is_dir && b.size > max_file_size,
            children,
        }
    }

    let mut children: Vec<FileNode> = top
        .children
        .into_iter()
        .map(|(name, b)| into_node(name, "", b, max_file_size))
        .collect();
    children.sort_by(|a, b| a.name.cmp(&b.name));

    FileNode {
        abs_path: root.to_path_buf(),
        rel_path: String::new(),
        name: root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        is_dir: true,
        is_symlink: false,
        size: 0,
        oversize: false,
        children,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn setup() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/main.rs"), "fn main() {}").unwrap();
        fs::write(dir.path().join("README.md"), "# hi").unwrap();
        fs::create_dir_all(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join(".git/HEAD"), "ref: refs/heads/main").unwrap();
        dir
    }

    #[test]
    fn builds_tree_and_skips_hidden() {
        let dir = setup();
        let result = build_tree(dir.path(), &TreeOptions::default()).unwrap();
        assert!(result.root.check_prefix_invariant());
        let names: Vec<_> = result.root.children.iter().map(|n| n.name.clone()).collect();
        assert!(names.contains(&"src".to_string()));
        assert!(names.contains(&"README.md".to_string()));
        assert!(!names.contains(&".git".to_string()));
    }

    #[test]
    fn missing_root_is_err_path() {
        let err = build_tree(Path::new("/does/not/exist"), &TreeOptions::default()).unwrap_err();
        assert!(matches!(err, TreeError::ErrPath(_)));
    }

    #[test]
    fn oversize_flag_set_at_boundary() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("big.bin"), vec![0u8; 10]).unwrap();
        let mut opts = TreeOptions::default();
        opts.max_file_size = 9;
        let result = build_tree(dir.path(), &opts).unwrap();
        let big = result
            .root
            .children
            .iter()
            .find(|n| n.name == "big.bin")
            .unwrap();
        assert!(big.oversize);

        opts.max_file_size = 10;
        let result = build_tree(dir.path(), &opts).unwrap();
        let big = result
            .root
            .children
            .iter()
            .find(|n| n.name == "big.bin")
            .unwrap();
        assert!(!big.oversize);
    }

    #[test]
    fn depth_21_is_skipped_and_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let mut cursor = dir.path().to_path_buf();
        for i in 1..=20 {
            cursor = cursor.join(format!("d{i}"));
            if i == 19 {
                fs::create_dir_all(&cursor).unwrap();
                fs::write(cursor.join("at20.txt"), "ok").unwrap();
            }
        }
        fs::create_dir_all(&cursor).unwrap();
        fs::write(cursor.join("at21.txt"), "too deep").unwrap();

        let result = build_tree(dir.path(), &TreeOptions::default()).unwrap();
        let names: Vec<_> = result.root.iter_files().map(|n| n.name.clone()).collect();
        assert!(names.contains(&"at20.txt".to_string()));
        assert!(!names.contains(&"at21.txt".to_string()));
        assert!(result.truncated);
    }

    #[test]
    fn custom_ignore_rule_excludes_path() {
        let dir = setup();
        let mut opts = TreeOptions::default();
        opts.workspace_ignore_rules = vec!["README.md".to_string()];
        let result = build_tree(dir.path(), &opts).unwrap();
        assert!(!result
            .root
            .children
            .iter()
            .any(|n| n.name == "README.md"));
    }
}
