use thiserror::Error;

/// Language-neutral error taxonomy, per the propagation policy: recoverable
/// conditions are handled at the lowest layer with context to react; the rest
/// bubble up with enough detail for the taskflow engine to retry, self-correct,
/// or fail.
#[derive(Debug, Error)]
pub enum ForgeError {
    // --- Input errors ---
    #[error("path error: {0}")]
    Path(String),
    #[error("invalid edit: {0}")]
    InvalidEdit(String),
    #[error("budget exhausted: {0}")]
    BudgetExhausted(String),
    #[error("invalid API key for provider '{0}'")]
    InvalidApiKey(String),

    // --- Policy errors ---
    #[error("context too large: {estimated} tokens exceeds ceiling of {ceiling}")]
    ContextTooLarge { estimated: usize, ceiling: usize },
    #[error("quota exceeded for provider '{0}'")]
    QuotaExceeded(String),
    #[error("policy violation: {0}")]
    PolicyViolation(String),

    // --- Transient errors (eligible for bounded retry with backoff) ---
    #[error("rate limit exceeded, retry after {retry_after_ms}ms")]
    RateLimitExceeded { retry_after_ms: u64 },
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),
    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    // --- Cancellation (never retried) ---
    #[error("operation canceled")]
    Canceled,

    // --- Data errors ---
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("parse error: {0}")]
    Parse(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ForgeError {
    /// Transient errors are eligible for bounded retry with exponential backoff.
    /// The two provider-facing transient kinds are distinguished only by backoff
    /// base: rate limits honor the server's `retry_after_ms`, provider-unavailable
    /// uses the caller's configured base.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ForgeError::RateLimitExceeded { .. }
                | ForgeError::ProviderUnavailable(_)
                | ForgeError::Timeout(_)
        )
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, ForgeError::Canceled)
    }

    /// Single-line `kind: message` classification, as printed by the CLI on
    /// a non-zero exit and mirrored into the `task.error` event.
    pub fn classify(&self) -> String {
        let kind = match self {
            ForgeError::Path(_) => "ErrPath",
            ForgeError::InvalidEdit(_) => "ErrInvalidEdit",
            ForgeError::BudgetExhausted(_) => "ErrBudgetExhausted",
            ForgeError::InvalidApiKey(_) => "ErrInvalidAPIKey",
            ForgeError::ContextTooLarge { .. } => "ErrContextTooLarge",
            ForgeError::QuotaExceeded(_) => "ErrQuotaExceeded",
            ForgeError::PolicyViolation(_) => "ErrPolicyViolation",
            ForgeError::RateLimitExceeded { .. } => "ErrRateLimitExceeded",
            ForgeError::ProviderUnavailable(_) => "ErrProviderUnavailable",
            ForgeError::Timeout(_) => "ErrTimeout",
            ForgeError::Canceled => "ErrCanceled",
            ForgeError::MalformedResponse(_) => "ErrMalformedResponse",
            ForgeError::Parse(_) => "ErrParse",
            ForgeError::Other(_) => "ErrInternal",
        };
        format!("{kind}: {self}")
    }
}

/// Per-operation apply failures. These are never thrown — they are carried on
/// `ApplyResult.success=false` so a batch of edits can partially succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ApplyErrorKind {
    #[error("anchor matched zero times")]
    ZeroMatches,
    #[error("anchor matched more than once")]
    MultipleMatches,
    #[error("anchor span crosses binary content")]
    AnchorCrossesBinary,
    #[error("write failed")]
    WriteFailed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_kinds() {
        assert!(ForgeError::RateLimitExceeded { retry_after_ms: 10 }.is_transient());
        assert!(ForgeError::ProviderUnavailable("x".into()).is_transient());
        assert!(!ForgeError::Canceled.is_transient());
        assert!(!ForgeError::Parse("x".into()).is_transient());
    }

    #[test]
    fn classify_format() {
        let e = ForgeError::ContextTooLarge {
            estimated: 100,
            ceiling: 50,
        };
        assert!(e.classify().starts_with("ErrContextTooLarge: "));
    }
}
