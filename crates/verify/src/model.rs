use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorType {
    Syntax,
    Import,
    TypeCheck,
    Linting,
    SecurityViolation,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub error_type: ErrorType,
    pub severity: Severity,
    pub suggestions: Vec<String>,
    pub source_file: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stage {
    FormatImportFix,
    BuildTypeCheck,
    Test,
    StaticSecurity,
    Optional,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::FormatImportFix => "format",
            Stage::BuildTypeCheck => "build",
            Stage::Test => "test",
            Stage::StaticSecurity => "security",
            Stage::Optional => "optional",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResult {
    pub pass: bool,
    pub findings: Vec<ErrorDetails>,
    pub skipped: bool,
    pub canceled: bool,
}

impl StageResult {
    pub fn skipped() -> Self {
        StageResult { pass: true, findings: Vec::new(), skipped: true, canceled: false }
    }

    pub fn canceled() -> Self {
        StageResult { pass: false, findings: Vec::new(), skipped: false, canceled: true }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerificationReport {
    pub stages: Vec<(String, StageResult)>,
}

impl VerificationReport {
    pub fn all_passed(&self) -> bool {
        self.stages.iter().all(|(_, r)| r.pass)
    }

    pub fn push(&mut self, stage: Stage, result: StageResult) {
        self.stages.push((stage.name().to_string(), result));
    }
}

/// Tunables that shape the pipeline run without changing its stage order.
#[derive(Debug, Clone)]
pub struct VerificationPolicy {
    pub max_test_retries: u32,
    pub run_optional: bool,
    pub changed_files: Vec<String>,
}

impl Default for VerificationPolicy {
    fn default() -> Self {
        VerificationPolicy { max_test_retries: 3, run_optional: false, changed_files: Vec::new() }
    }
}
