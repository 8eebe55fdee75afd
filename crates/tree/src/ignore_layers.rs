use std::path::Path;

use ignore::overrides::{Override, OverrideBuilder};

/// The three ignore layers from the data model: `.gitignore` (per directory,
/// handled natively by `WalkBuilder`), workspace custom rules (checked into
/// the repo, e.g. a forge-specific ignore list), and user custom rules
/// (local-only, highest precedence). Rules compose per POSIX gitignore
/// semantics; the `ignore` crate's `Override` type already implements
/// last-match-wins negation (`!pattern`) and `**`-depth globs, so each layer
/// is just a distinct `Override` evaluated in order.
pub struct IgnoreLayers {
    pub workspace: Option<Override>,
    pub user: Option<Override>,
}

impl IgnoreLayers {
    pub fn build(
        root: &Path,
        workspace_rules: &[String],
        user_rules: &[String],
    ) -> anyhow::Result<Self> {
        let workspace = build_override(root, workspace_rules)?;
        let user = build_override(root, user_rules)?;
        Ok(Self { workspace, user })
    }

    pub fn empty() -> Self {
        Self {
            workspace: None,
            user: None,
        }
    }

    /// A path is ignored iff the *last* matching rule across both layers
    /// (user layer checked after workspace, since it's the deeper/last
    /// layer) denies it. `WalkBuilder`'s native gitignore handling already
    /// applies the per-directory `.gitignore` layer before these run.
    pub fn is_ignored(&self, rel_path: &str, is_dir: bool) -> bool {
        let mut ignored = false;
        if let Some(ov) = &self.workspace {
            match ov.matched(rel_path, is_dir) {
                m if m.is_ignore() => ignored = true,
                m if m.is_whitelist() => ignored = false,
                _ => {}
            }
        }
        if let Some(ov) = &self.user {
            match ov.matched(rel_path, is_dir) {
                m if m.is_ignore() => ignored = true,
                m if m.is_whitelist() => ignored = false,
                _ => {}
            }
        }
        ignored
    }
}

fn build_override(root: &Path, rules: &[String]) -> anyhow::Result<Option<Override>> {
    if rules.is_empty() {
        return Ok(None);
    }
    let mut builder = OverrideBuilder::new(root);
    for rule in rules {
        builder.add(rule)?;
    }
    Ok(Some(builder.build()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negation_overrides_prior_ignore() {
        let root = tempfile::tempdir().unwrap();
        let layers = IgnoreLayers::build(
            root.path(),
            &["*.log".to_string(), "!important.log".to_string()],
            &[],
        )
        .unwrap();
        assert!(layers.is_ignored("debug.log", false));
        assert!(!layers.is_ignored("important.log", false));
    }

    #[test]
    fn user_layer_is_last_and_wins() {
        let root = tempfile::tempdir().unwrap();
        let layers = IgnoreLayers::build(
            root.path(),
            &["!keep.txt".to_string()],
            &["keep.txt".to_string()],
        )
        .unwrap();
        assert!(layers.is_ignored("keep.txt", false));
    }

    #[test]
    fn empty_layers_ignore_nothing() {
        let layers = IgnoreLayers::empty();
        assert!(!layers.is_ignored("anything", false));
    }
}
