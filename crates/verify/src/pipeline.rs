use std::path::Path;

use forge_common::Cancellation;
use forge_events::{EventBus, Payload};
use forge_symbols::SymbolIndex;

use crate::adapters::{detect_adapter, Commands, LanguageVerifyAdapter};
use crate::model::{Stage, StageResult, VerificationPolicy, VerificationReport};

pub struct VerificationPipeline;

impl Default for VerificationPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl VerificationPipeline {
    pub fn new() -> Self {
        VerificationPipeline
    }

    /// Runs every stage in order against `workspace`, consulting
    /// `symbol_index` (if given) to narrow the test stage via the call
    /// graph. A stage is skipped outright if the language registry offers
    /// no adapter for the project; cancellation stops the run between
    /// stage boundaries and every not-yet-started stage is absent from the
    /// report rather than marked failed. `events`, when given, receives a
    /// `verify.stageResult` publish as each stage completes, so a caller
    /// watches live progress instead of waiting on the final report.
    pub async fn verify(
        &self,
        workspace: &Path,
        policy: &VerificationPolicy,
        symbol_index: Option<&SymbolIndex>,
        cancellation: &Cancellation,
        events: Option<&EventBus>,
    ) -> VerificationReport {
        let mut report = VerificationReport::default();

        let Some(adapter) = detect_adapter(workspace) else {
            for stage in [Stage::FormatImportFix, Stage::BuildTypeCheck, Stage::Test, Stage::StaticSecurity, Stage::Optional] {
                push_and_publish(&mut report, stage, StageResult::skipped(), events);
            }
            return report;
        };
        let commands = adapter.commands(workspace);

        for stage in [Stage::FormatImportFix, Stage::BuildTypeCheck, Stage::Test, Stage::StaticSecurity, Stage::Optional] {
            if cancellation.is_canceled() {
                push_and_publish(&mut report, stage, StageResult::canceled(), events);
                continue;
            }
            let result = match stage {
                Stage::FormatImportFix => run_simple_stage(stage, workspace, commands.format.as_deref(), adapter.as_ref()).await,
                Stage::BuildTypeCheck => run_simple_stage(stage, workspace, commands.build.as_deref(), adapter.as_ref()).await,
                Stage::Test => run_test_stage(workspace, &commands, adapter.as_ref(), policy, symbol_index, cancellation).await,
                Stage::StaticSecurity => run_simple_stage(stage, workspace, commands.security.as_deref(), adapter.as_ref()).await,
                Stage::Optional => {
                    if policy.run_optional {
                        run_simple_stage(stage, workspace, commands.optional.as_deref(), adapter.as_ref()).await
                    } else {
                        StageResult::skipped()
                    }
                }
            };
            push_and_publish(&mut report, stage, result, events);
        }

        report
    }
}

fn push_and_publish(report: &mut VerificationReport, stage: Stage, result: StageResult, events: Option<&EventBus>) {
    if let Some(bus) = events {
        bus.publish(Payload::VerifyStageResult { stage: stage.name().to_string(), pass: result.pass, findings: result.findings.len() });
    }
    report.push(stage, result);
}

async fn run_simple_stage(stage: Stage, workspace: &Path, command: Option<&str>, adapter: &dyn LanguageVerifyAdapter) -> StageResult {
    let Some(command) = command else { return StageResult::skipped() };
    let output = run_shell(workspace, command).await;
    to_stage_result(stage, adapter, output)
}

async fn run_test_stage(
    workspace: &Path,
    commands: &Commands,
    adapter: &dyn LanguageVerifyAdapter,
    policy: &VerificationPolicy,
    symbol_index: Option<&SymbolIndex>,
    cancellation: &Cancellation,
) -> StageResult {
    let changed = if !policy.changed_files.is_empty() {
        match symbol_index {
            Some(index) => crate::targeted::affected_files(index, &policy.changed_files, 2),
            None => policy.changed_files.clone(),
        }
    } else {
        Vec::new()
    };

    let Some(test_command) = adapter.targeted_test_command(&changed).or_else(|| commands.test.clone()) else {
        return StageResult::skipped();
    };

    let mut output = run_shell(workspace, &test_command).await;
    let mut attempts = 0;
    while !output.success && attempts < policy.max_test_retries && !cancellation.is_canceled() {
        attempts += 1;
        output = run_shell(workspace, &test_command).await;
    }

    let test_result = to_stage_result(Stage::Test, adapter, output);

    if !test_result.pass {
        return test_result;
    }

    match &commands.smoke {
        Some(cmd) => {
            let output = run_shell(workspace, cmd).await;
            to_stage_result(Stage::Test, adapter, output)
        }
        None => test_result,
    }
}

struct ShellOutput {
    success: bool,
    exit_code: i32,
    stdout: String,
    stderr: String,
}

async fn run_shell(cwd: &Path, command: &str) -> ShellOutput {
    let result = tokio::process::Command::new("sh").arg("-c").arg(command).current_dir(cwd).output().await;
    match result {
        Ok(output) => ShellOutput {
            success: output.status.success(),
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        },
        Err(e) => ShellOutput { success: false, exit_code: -1, stdout: String::new(), stderr: format!("failed to execute: {e}") },
    }
}

fn to_stage_result(stage: Stage, adapter: &dyn LanguageVerifyAdapter, output: ShellOutput) -> StageResult {
    if output.success {
        StageResult { pass: true, findings: Vec::new(), skipped: false, canceled: false }
    } else {
        StageResult { pass: false, findings: adapter.classify(stage, &output.stdout, &output.stderr), skipped: false, canceled: false }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn skips_every_stage_with_no_adapter() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = VerificationPipeline::new();
        let report = pipeline.verify(dir.path(), &VerificationPolicy::default(), None, &Cancellation::new(), None).await;
        assert!(report.all_passed());
        assert!(report.stages.iter().all(|(_, r)| r.skipped));
    }

    #[tokio::test]
    async fn cancellation_before_run_cancels_every_stage() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Cargo.toml"), "[package]\n").unwrap();
        let pipeline = VerificationPipeline::new();
        let cancellation = Cancellation::new();
        cancellation.cancel();
        let report = pipeline.verify(dir.path(), &VerificationPolicy::default(), None, &cancellation, None).await;
        assert!(report.stages.iter().all(|(_, r)| r.canceled));
    }
}
