use std::path::{Component, Path, PathBuf};

use forge_common::ForgeError;

use crate::anchor::apply_anchor;
use crate::hooks::HookRegistry;
use crate::model::{AnchorOp, ApplyResult, BackupSnapshot, Edit, EditKind};

pub struct ApplyEngine {
    root: PathBuf,
    hooks: HookRegistry,
}

impl ApplyEngine {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ApplyEngine { root: root.into(), hooks: HookRegistry::new() }
    }

    pub fn with_hooks(root: impl Into<PathBuf>, hooks: HookRegistry) -> Self {
        ApplyEngine { root: root.into(), hooks }
    }

    /// Structural checks only: anchor patches must carry an anchor, every
    /// path must resolve inside the workspace root. Does not touch the
    /// filesystem.
    pub fn validate(&self, edits: &[Edit]) -> Result<(), ForgeError> {
        for edit in edits {
            resolve_within_root(&self.root, &edit.path)
                .map_err(|e| ForgeError::InvalidEdit(format!("{}: {e}", edit.path)))?;
            if edit.kind == EditKind::AnchorPatch && edit.anchor.is_none() {
                return Err(ForgeError::InvalidEdit(format!(
                    "{}: anchorPatch requires an anchor",
                    edit.path
                )));
            }
        }
        Ok(())
    }

    /// Applies every edit in order. Returns one [`ApplyResult`] per edit,
    /// in the same order, so the caller can roll back by reversing the
    /// slice. Fails the whole batch only on a path-traversal violation;
    /// every other failure is reported per-operation.
    pub fn apply(&self, edits: &[Edit]) -> Result<Vec<ApplyResult>, ForgeError> {
        let mut results = Vec::with_capacity(edits.len());
        for edit in edits {
            let abs_path = resolve_within_root(&self.root, &edit.path)
                .map_err(|e| ForgeError::PolicyViolation(format!("{}: {e}", edit.path)))?;
            results.push(self.apply_one(edit, &abs_path));
        }
        Ok(results)
    }

    fn apply_one(&self, edit: &Edit, abs_path: &Path) -> ApplyResult {
        let backup = match BackupSnapshot::capture(abs_path) {
            Ok(b) => b,
            Err(e) => return ApplyResult::failed(&edit.id, &edit.path, format!("backup failed: {e}")),
        };

        let new_bytes = match edit.kind {
            EditKind::FullRewrite => Ok(edit.content.as_bytes().to_vec()),
            EditKind::AnchorPatch => {
                let anchor = edit.anchor.as_ref().expect("validated before apply");
                apply_anchor(&backup.content, &anchor.before, &anchor.after, edit.op, &edit.content)
                    .map_err(|e| e.as_str().to_string())
            }
        };

        let new_bytes = match new_bytes {
            Ok(b) => b,
            Err(msg) => return ApplyResult::failed(&edit.id, &edit.path, msg),
        };

        let final_bytes = match std::str::from_utf8(&new_bytes) {
            Ok(text) => self.hooks.run(edit.language.as_deref(), abs_path, text.to_string()).into_bytes(),
            Err(_) => new_bytes,
        };

        match write_atomic(abs_path, &final_bytes) {
            Ok(()) => ApplyResult::ok(&edit.id, &edit.path, backup),
            Err(e) => ApplyResult::failed(&edit.id, &edit.path, format!("write failed: {e}")),
        }
    }

    /// Restores the prior content for every successful result, walking
    /// the slice in reverse so later operations are undone before earlier
    /// ones that may have created shared parent directories.
    pub fn rollback(&self, results: &[ApplyResult]) -> Result<(), ForgeError> {
        for result in results.iter().rev() {
            if !result.success {
                continue;
            }
            let Some(backup) = &result.backup_snapshot else { continue };
            let abs_path = resolve_within_root(&self.root, &result.path)
                .map_err(|e| ForgeError::PolicyViolation(format!("{}: {e}", result.path)))?;
            if backup.existed {
                if let Some(parent) = abs_path.parent() {
                    std::fs::create_dir_all(parent).map_err(|e| ForgeError::Other(e.into()))?;
                }
                std::fs::write(&abs_path, &backup.content).map_err(|e| ForgeError::Other(e.into()))?;
            } else if abs_path.exists() {
                std::fs::remove_file(&abs_path).map_err(|e| ForgeError::Other(e.into()))?;
            }
        }
        Ok(())
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".forgetmp");
    let tmp = path.with_file_name(tmp_name);
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Lexically joins `rel` onto `root` and rejects any result that escapes
/// `root`, without requiring the path to exist (a `fullRewrite` may target
/// a brand-new file).
fn resolve_within_root(root: &Path, rel: &str) -> Result<PathBuf, String> {
    let mut out = root.to_path_buf();
    let mut depth = 0usize;
    for component in Path::new(rel).components() {
        match component {
            Component::Normal(part) => {
                out.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return Err("path escapes workspace root".to_string());
                }
                out.pop();
                depth -= 1;
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err("absolute paths are not allowed".to_string());
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Anchor;

    fn edit(id: &str, path: &str, kind: EditKind, op: AnchorOp, content: &str, anchor: Option<Anchor>) -> Edit {
        Edit { id: id.to_string(), path: path.to_string(), language: None, kind, op, content: content.to_string(), anchor }
    }

    #[test]
    fn full_rewrite_creates_missing_parents() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ApplyEngine::new(dir.path());
        let edits = vec![edit("1", "nested/dir/a.txt", EditKind::FullRewrite, AnchorOp::Replace, "hi\n", None)];
        let results = engine.apply(&edits).unwrap();
        assert!(results[0].success);
        assert_eq!(std::fs::read_to_string(dir.path().join("nested/dir/a.txt")).unwrap(), "hi\n");
    }

    #[test]
    fn anchor_patch_applies_and_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello\nworld\n").unwrap();
        let engine = ApplyEngine::new(dir.path());
        let edits = vec![edit(
            "1",
            "a.txt",
            EditKind::AnchorPatch,
            AnchorOp::Replace,
            "HELLO\n",
            Some(Anchor { before: "hello\n".to_string(), after: "world\n".to_string() }),
        )];
        let results = engine.apply(&edits).unwrap();
        assert!(results[0].success);
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "HELLO\nworld\n");

        engine.rollback(&results).unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "hello\nworld\n");
    }

    #[test]
    fn multiple_match_reports_failure_without_mutating() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.go"), "x\nx\n").unwrap();
        let engine = ApplyEngine::new(dir.path());
        let edits = vec![edit(
            "1",
            "b.go",
            EditKind::AnchorPatch,
            AnchorOp::Delete,
            "",
            Some(Anchor { before: "x\n".to_string(), after: String::new() }),
        )];
        let results = engine.apply(&edits).unwrap();
        assert!(!results[0].success);
        assert_eq!(results[0].error.as_deref(), Some("multipleMatches"));
        assert_eq!(std::fs::read_to_string(dir.path().join("b.go")).unwrap(), "x\nx\n");
    }

    #[test]
    fn validate_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ApplyEngine::new(dir.path());
        let edits = vec![edit("1", "../outside.txt", EditKind::FullRewrite, AnchorOp::Replace, "x", None)];
        assert!(engine.validate(&edits).is_err());
    }

    #[test]
    fn apply_errors_on_traversal_as_a_batch_invariant() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ApplyEngine::new(dir.path());
        let edits = vec![edit("1", "../outside.txt", EditKind::FullRewrite, AnchorOp::Replace, "x", None)];
        assert!(engine.apply(&edits).is_err());
    }

    #[test]
    fn validate_rejects_anchor_patch_without_anchor() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ApplyEngine::new(dir.path());
        let edits = vec![edit("1", "a.txt", EditKind::AnchorPatch, AnchorOp::Replace, "x", None)];
        assert!(engine.validate(&edits).is_err());
    }

    #[test]
    fn rollback_removes_file_that_did_not_exist_before() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ApplyEngine::new(dir.path());
        let edits = vec![edit("1", "new.txt", EditKind::FullRewrite, AnchorOp::Replace, "hi\n", None)];
        let results = engine.apply(&edits).unwrap();
        assert!(dir.path().join("new.txt").exists());
        engine.rollback(&results).unwrap();
        assert!(!dir.path().join("new.txt").exists());
    }
}
