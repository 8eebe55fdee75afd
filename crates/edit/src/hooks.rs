use std::collections::HashMap;
use std::path::Path;

/// Reformats a file's contents in place. Implementations shell out to the
/// language's native formatter; failures are logged by the caller, never
/// propagated into the apply result.
pub trait Formatter: Send + Sync {
    fn format(&self, path: &Path, content: &str) -> anyhow::Result<String>;
}

/// Rewrites a file's import/use block after an edit may have added or
/// removed references.
pub trait ImportFixer: Send + Sync {
    fn fix_imports(&self, path: &Path, content: &str) -> anyhow::Result<String>;
}

#[derive(Default)]
pub struct HookRegistry {
    formatters: HashMap<String, Box<dyn Formatter>>,
    import_fixers: HashMap<String, Box<dyn ImportFixer>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_formatter(&mut self, language: impl Into<String>, f: Box<dyn Formatter>) {
        self.formatters.insert(language.into(), f);
    }

    pub fn register_import_fixer(&mut self, language: impl Into<String>, f: Box<dyn ImportFixer>) {
        self.import_fixers.insert(language.into(), f);
    }

    /// Runs the registered formatter then import fixer for `language` against
    /// `content`, returning the possibly-rewritten text. Any hook failure is
    /// logged and the input from before that hook is kept.
    pub fn run(&self, language: Option<&str>, path: &Path, content: String) -> String {
        let Some(language) = language else { return content };
        let mut out = content;
        if let Some(f) = self.formatters.get(language) {
            match f.format(path, &out) {
                Ok(formatted) => out = formatted,
                Err(e) => tracing::warn!(path = %path.display(), %language, error = %e, "formatter hook failed"),
            }
        }
        if let Some(f) = self.import_fixers.get(language) {
            match f.fix_imports(path, &out) {
                Ok(fixed) => out = fixed,
                Err(e) => tracing::warn!(path = %path.display(), %language, error = %e, "import-fixer hook failed"),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct UpperFormatter;
    impl Formatter for UpperFormatter {
        fn format(&self, _path: &Path, content: &str) -> anyhow::Result<String> {
            Ok(content.to_uppercase())
        }
    }

    struct FailingFixer;
    impl ImportFixer for FailingFixer {
        fn fix_imports(&self, _path: &Path, _content: &str) -> anyhow::Result<String> {
            anyhow::bail!("boom")
        }
    }

    #[test]
    fn runs_registered_formatter() {
        let mut reg = HookRegistry::new();
        reg.register_formatter("rust", Box::new(UpperFormatter));
        let out = reg.run(Some("rust"), Path::new("a.rs"), "hi".to_string());
        assert_eq!(out, "HI");
    }

    #[test]
    fn failing_hook_keeps_prior_content() {
        let mut reg = HookRegistry::new();
        reg.register_import_fixer("rust", Box::new(FailingFixer));
        let out = reg.run(Some("rust"), Path::new("a.rs"), "hi".to_string());
        assert_eq!(out, "hi");
    }

    #[test]
    fn unregistered_language_passes_through() {
        let reg = HookRegistry::new();
        let out = reg.run(Some("cobol"), Path::new("a.cob"), "hi".to_string());
        assert_eq!(out, "hi");
    }

    #[test]
    fn no_language_passes_through() {
        let reg = HookRegistry::new();
        let out = reg.run(None, Path::new("a"), "hi".to_string());
        assert_eq!(out, "hi");
    }
}
