use std::path::Path;
use std::process::Command;

use crate::hooks::{Formatter, HookRegistry, ImportFixer};

/// Shells out to an in-place formatter, the same invocation shape as the
/// rustfmt/prettier/gofmt table: write the content to a scratch sibling of
/// the real file (so tools that scan the project directory still see it in
/// context), run the tool against the scratch copy, read the result back.
struct ShellFormatter {
    command: &'static str,
    args: &'static [&'static str],
}

impl Formatter for ShellFormatter {
    fn format(&self, path: &Path, content: &str) -> anyhow::Result<String> {
        run_in_place(self.command, self.args, path, content)
    }
}

struct ShellImportFixer {
    command: &'static str,
    args: &'static [&'static str],
}

impl ImportFixer for ShellImportFixer {
    fn fix_imports(&self, path: &Path, content: &str) -> anyhow::Result<String> {
        run_in_place(self.command, self.args, path, content)
    }
}

fn run_in_place(command: &str, args: &[&str], path: &Path, content: &str) -> anyhow::Result<String> {
    let mut scratch_name = path.file_name().unwrap_or_default().to_os_string();
    scratch_name.push(".forgefmt");
    let scratch = path.with_file_name(scratch_name);
    std::fs::write(&scratch, content)?;

    let resolved: Vec<String> = args.iter().map(|a| a.replace("{file}", &scratch.to_string_lossy())).collect();
    let outcome = (|| -> anyhow::Result<String> {
        let status = Command::new(command).args(&resolved).status()?;
        if !status.success() {
            anyhow::bail!("{command} exited with {status}");
        }
        Ok(std::fs::read_to_string(&scratch)?)
    })();

    let _ = std::fs::remove_file(&scratch);
    outcome
}

/// The hook set wired into every real `ApplyEngine`: rustfmt/prettier/gofmt
/// for formatting, goimports/ruff for import fixing, keyed by the same
/// language tags the model is asked to stamp on each edit. A missing binary
/// just makes the hook fail and `HookRegistry::run` keeps the prior content.
pub fn default_hooks() -> HookRegistry {
    let mut reg = HookRegistry::new();
    reg.register_formatter("rust", Box::new(ShellFormatter { command: "rustfmt", args: &["{file}"] }));
    reg.register_formatter("typescript", Box::new(ShellFormatter { command: "npx", args: &["prettier", "--write", "{file}"] }));
    reg.register_formatter("javascript", Box::new(ShellFormatter { command: "npx", args: &["prettier", "--write", "{file}"] }));
    reg.register_formatter("go", Box::new(ShellFormatter { command: "gofmt", args: &["-w", "{file}"] }));
    reg.register_formatter("python", Box::new(ShellFormatter { command: "ruff", args: &["format", "{file}"] }));

    reg.register_import_fixer("go", Box::new(ShellImportFixer { command: "goimports", args: &["-w", "{file}"] }));
    reg.register_import_fixer("python", Box::new(ShellImportFixer { command: "ruff", args: &["check", "--fix", "--select", "I", "{file}"] }));
    reg
}
