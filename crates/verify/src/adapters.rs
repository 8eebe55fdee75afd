use std::path::Path;

use crate::model::{ErrorDetails, ErrorType, Severity, Stage};

#[derive(Debug, Clone, Default)]
pub struct Commands {
    pub format: Option<String>,
    pub build: Option<String>,
    pub test: Option<String>,
    pub smoke: Option<String>,
    pub security: Option<String>,
    pub optional: Option<String>,
}

pub trait LanguageVerifyAdapter: Send + Sync {
    fn language(&self) -> &'static str;

    /// True if `workspace` looks like a project this adapter handles.
    fn detects(&self, workspace: &Path) -> bool;

    fn commands(&self, workspace: &Path) -> Commands;

    /// Targeted-test scoping: given files changed this attempt, narrow the
    /// full test command to just what's affected, or `None` to fall back
    /// to the full suite.
    fn targeted_test_command(&self, changed_files: &[String]) -> Option<String>;

    /// Best-effort classification of a failing stage's tool output.
    fn classify(&self, stage: Stage, stdout: &str, stderr: &str) -> Vec<ErrorDetails> {
        classify_generic(stage, stdout, stderr)
    }
}

/// Keyword-based classification shared by adapters that don't need
/// language-specific parsing of their tool's diagnostics.
fn classify_generic(stage: Stage, stdout: &str, stderr: &str) -> Vec<ErrorDetails> {
    let combined = format!("{stdout}\n{stderr}");
    let lower = combined.to_lowercase();

    let error_type = if stage == Stage::StaticSecurity {
        ErrorType::SecurityViolation
    } else if lower.contains("unresolved import") || lower.contains("cannot find module") || lower.contains("no module named") || lower.contains("import error") {
        ErrorType::Import
    } else if lower.contains("mismatched types") || lower.contains("type error") || lower.contains("is not assignable to type") {
        ErrorType::TypeCheck
    } else if lower.contains("syntaxerror") || lower.contains("expected one of") || lower.contains("unexpected token") {
        ErrorType::Syntax
    } else if stage == Stage::FormatImportFix {
        ErrorType::Linting
    } else {
        ErrorType::Unknown
    };

    vec![ErrorDetails {
        error_type,
        severity: Severity::Error,
        suggestions: Vec::new(),
        source_file: None,
        message: combined.trim().chars().take(2000).collect(),
    }]
}

pub struct RustAdapter;

impl LanguageVerifyAdapter for RustAdapter {
    fn language(&self) -> &'static str {
        "rust"
    }

    fn detects(&self, workspace: &Path) -> bool {
        workspace.join("Cargo.toml").exists()
    }

    fn commands(&self, _workspace: &Path) -> Commands {
        Commands {
            format: Some("cargo fmt --check".to_string()),
            build: Some("cargo check".to_string()),
            test: Some("cargo test".to_string()),
            smoke: Some("cargo test --doc".to_string()),
            security: Some("cargo audit".to_string()),
            optional: Some("cargo license".to_string()),
        }
    }

    fn targeted_test_command(&self, changed_files: &[String]) -> Option<String> {
        let modules: Vec<&str> = changed_files
            .iter()
            .filter(|f| f.ends_with(".rs"))
            .filter_map(|f| Path::new(f).file_stem().and_then(|s| s.to_str()))
            .collect();
        if modules.is_empty() {
            return None;
        }
        Some(format!("cargo test {}", modules.join(" ")))
    }
}

pub struct NodeAdapter;

impl LanguageVerifyAdapter for NodeAdapter {
    fn language(&self) -> &'static str {
        "typescript"
    }

    fn detects(&self, workspace: &Path) -> bool {
        workspace.join("package.json").exists()
    }

    fn commands(&self, workspace: &Path) -> Commands {
        let eslint = workspace.join("node_modules/.bin/eslint").exists();
        Commands {
            format: Some("npx prettier --check .".to_string()),
            build: Some("npm run build".to_string()),
            test: Some("npm test".to_string()),
            smoke: Some("npm test -- --smoke".to_string()),
            security: Some("npm audit --audit-level=high".to_string()),
            optional: eslint.then(|| "npx eslint .".to_string()),
        }
    }

    fn targeted_test_command(&self, changed_files: &[String]) -> Option<String> {
        let files: Vec<&str> = changed_files.iter().filter(|f| f.ends_with(".ts") || f.ends_with(".tsx") || f.ends_with(".js")).map(|s| s.as_str()).collect();
        if files.is_empty() {
            return None;
        }
        Some(format!("npx jest {}", files.join(" ")))
    }
}

pub struct GoAdapter;

impl LanguageVerifyAdapter for GoAdapter {
    fn language(&self) -> &'static str {
        "go"
    }

    fn detects(&self, workspace: &Path) -> bool {
        workspace.join("go.mod").exists()
    }

    fn commands(&self, _workspace: &Path) -> Commands {
        Commands {
            format: Some("gofmt -l .".to_string()),
            build: Some("go build ./...".to_string()),
            test: Some("go test ./...".to_string()),
            smoke: Some("go vet ./...".to_string()),
            security: Some("govulncheck ./...".to_string()),
            optional: None,
        }
    }

    fn targeted_test_command(&self, changed_files: &[String]) -> Option<String> {
        let packages: Vec<String> = changed_files
            .iter()
            .filter(|f| f.ends_with(".go"))
            .filter_map(|f| Path::new(f).parent().map(|p| format!("./{}/...", p.display())))
            .collect();
        if packages.is_empty() {
            return None;
        }
        Some(format!("go test {}", packages.join(" ")))
    }
}

pub struct PythonAdapter;

impl LanguageVerifyAdapter for PythonAdapter {
    fn language(&self) -> &'static str {
        "python"
    }

    fn detects(&self, workspace: &Path) -> bool {
        workspace.join("pyproject.toml").exists() || workspace.join("setup.py").exists()
    }

    fn commands(&self, _workspace: &Path) -> Commands {
        Commands {
            format: Some("python -m ruff format --check .".to_string()),
            build: None,
            test: Some("python -m pytest".to_string()),
            smoke: Some("python -m pytest -k smoke".to_string()),
            security: Some("python -m bandit -r .".to_string()),
            optional: Some("pip-licenses".to_string()),
        }
    }

    fn targeted_test_command(&self, changed_files: &[String]) -> Option<String> {
        let files: Vec<&str> = changed_files.iter().filter(|f| f.ends_with(".py")).map(|s| s.as_str()).collect();
        if files.is_empty() {
            return None;
        }
        Some(format!("python -m pytest {}", files.join(" ")))
    }
}

pub fn detect_adapter(workspace: &Path) -> Option<Box<dyn LanguageVerifyAdapter>> {
    let adapters: Vec<Box<dyn LanguageVerifyAdapter>> = vec![Box::new(RustAdapter), Box::new(NodeAdapter), Box::new(GoAdapter), Box::new(PythonAdapter)];
    adapters.into_iter().find(|a| a.detects(workspace))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_rust_project() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Cargo.toml"), "[package]\n").unwrap();
        let adapter = detect_adapter(dir.path()).unwrap();
        assert_eq!(adapter.language(), "rust");
    }

    #[test]
    fn no_adapter_for_unknown_project() {
        let dir = tempfile::tempdir().unwrap();
        assert!(detect_adapter(dir.path()).is_none());
    }

    #[test]
    fn classify_flags_import_errors() {
        let findings = classify_generic(Stage::BuildTypeCheck, "", "error[E0433]: unresolved import `foo`");
        assert_eq!(findings[0].error_type, ErrorType::Import);
    }
}
