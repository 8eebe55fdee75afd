use forge_verify::{ErrorType, VerificationReport};

/// The correction a failing verification stage calls for, mirroring the
/// teacher's `SignalKind` classification but over a verify stage instead of
/// a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrectiveAction {
    FixSyntax,
    FixImports,
    FixTypeError,
    FixLintViolation,
    RemoveSecurityViolation,
    Unknown,
}

impl CorrectiveAction {
    fn instruction(self) -> &'static str {
        match self {
            CorrectiveAction::FixSyntax => "Fix the syntax error before anything else",
            CorrectiveAction::FixImports => "Fix the unresolved or unused import",
            CorrectiveAction::FixTypeError => "Fix the type-checking error",
            CorrectiveAction::FixLintViolation => "Resolve the lint violation",
            CorrectiveAction::RemoveSecurityViolation => "Remove the flagged security violation",
            CorrectiveAction::Unknown => "Address the verification failure",
        }
    }
}

/// Finds the first failing, non-skipped stage and classifies its
/// highest-severity finding.
pub struct ErrorAnalyzer;

impl ErrorAnalyzer {
    pub fn analyze(report: &VerificationReport) -> Option<(CorrectiveAction, String)> {
        let (_, failing) = report.stages.iter().find(|(_, r)| !r.pass && !r.skipped && !r.canceled)?;
        let worst = failing.findings.iter().max_by_key(|f| f.severity)?;
        let action = match worst.error_type {
            ErrorType::Syntax => CorrectiveAction::FixSyntax,
            ErrorType::Import => CorrectiveAction::FixImports,
            ErrorType::TypeCheck => CorrectiveAction::FixTypeError,
            ErrorType::Linting => CorrectiveAction::FixLintViolation,
            ErrorType::SecurityViolation => CorrectiveAction::RemoveSecurityViolation,
            ErrorType::Unknown => CorrectiveAction::Unknown,
        };
        Some((action, worst.message.clone()))
    }
}

/// Turns an `ErrorAnalyzer` verdict (or a malformed-response detail) into a
/// refined prompt fragment for the node's next attempt.
pub struct CorrectionEngine;

impl CorrectionEngine {
    pub fn refine_for_verify_failure(original_prompt: &str, action: CorrectiveAction, detail: &str) -> String {
        format!("{original_prompt}\n\n{}:\n{detail}", action.instruction())
    }

    pub fn refine_for_malformed_response(original_prompt: &str, parse_error: &str) -> String {
        format!(
            "{original_prompt}\n\nYour last response could not be parsed as the required JSON edit plan ({parse_error}). \
             Respond with nothing but the JSON object."
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_verify::{ErrorDetails, Severity, StageResult, VerificationReport};

    fn report_with(error_type: ErrorType, severity: Severity) -> VerificationReport {
        let mut report = VerificationReport::default();
        report.stages.push((
            "build".to_string(),
            StageResult {
                pass: false,
                findings: vec![ErrorDetails { error_type, severity, suggestions: vec![], source_file: None, message: "boom".into() }],
                skipped: false,
                canceled: false,
            },
        ));
        report
    }

    #[test]
    fn classifies_syntax_failure() {
        let report = report_with(ErrorType::Syntax, Severity::Error);
        let (action, detail) = ErrorAnalyzer::analyze(&report).unwrap();
        assert_eq!(action, CorrectiveAction::FixSyntax);
        assert_eq!(detail, "boom");
    }

    #[test]
    fn no_verdict_when_nothing_failed() {
        let report = VerificationReport::default();
        assert!(ErrorAnalyzer::analyze(&report).is_none());
    }

    #[test]
    fn refined_prompt_carries_the_instruction() {
        let refined = CorrectionEngine::refine_for_verify_failure("fix it", CorrectiveAction::FixImports, "missing `use`");
        assert!(refined.contains("unresolved or unused import"));
        assert!(refined.contains("missing `use`"));
    }
}
