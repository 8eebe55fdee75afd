use std::sync::Arc;

use forge_common::ForgeError;

use crate::Provider;

/// The closed set of providers this system speaks to. Adding a sixth
/// provider means adding a variant here plus its module -- there is no
/// open-ended `api_style` string dispatch left to route around it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAI,
    Gemini,
    OpenRouter,
    LocalAI,
    Qwen,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "openai",
            ProviderKind::Gemini => "gemini",
            ProviderKind::OpenRouter => "openrouter",
            ProviderKind::LocalAI => "localai",
            ProviderKind::Qwen => "qwen",
        }
    }

    pub fn all() -> &'static [ProviderKind] {
        &[ProviderKind::OpenAI, ProviderKind::Gemini, ProviderKind::OpenRouter, ProviderKind::LocalAI, ProviderKind::Qwen]
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::all().iter().copied().find(|k| k.as_str() == name)
    }

    /// Whether this provider requires a credential to function at all.
    /// LocalAI is the one exception -- most deployments run unauthenticated.
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, ProviderKind::LocalAI)
    }
}

/// Builds the `Provider` for `kind`. `api_key` may be absent only for
/// `LocalAI`; every other kind returns `ErrInvalidAPIKey` up front rather
/// than failing on the first request.
pub fn create_provider(kind: ProviderKind, api_key: Option<String>, base_url: Option<String>, model: Option<String>) -> Result<Arc<dyn Provider>, ForgeError> {
    if kind.requires_api_key() && api_key.as_deref().unwrap_or("").is_empty() {
        return Err(ForgeError::InvalidApiKey(kind.as_str().to_string()));
    }

    let provider: Arc<dyn Provider> = match kind {
        ProviderKind::OpenAI => Arc::new(crate::openai::new(api_key.unwrap_or_default(), base_url, model)),
        ProviderKind::Gemini => Arc::new(crate::gemini::GeminiProvider::new(api_key.unwrap_or_default(), base_url, model)),
        ProviderKind::OpenRouter => Arc::new(crate::openrouter::new(api_key.unwrap_or_default(), base_url, model)),
        ProviderKind::LocalAI => Arc::new(crate::localai::new(api_key, base_url, model)),
        ProviderKind::Qwen => Arc::new(crate::qwen::new(api_key.unwrap_or_default(), base_url, model)),
    };
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_registry_name() {
        for kind in ProviderKind::all() {
            assert_eq!(ProviderKind::parse(kind.as_str()), Some(*kind));
        }
    }

    #[test]
    fn rejects_unknown_provider_name() {
        assert_eq!(ProviderKind::parse("anthropic"), None);
    }

    #[test]
    fn missing_api_key_rejected_for_openai() {
        let err = create_provider(ProviderKind::OpenAI, None, None, None).unwrap_err();
        assert!(matches!(err, ForgeError::InvalidApiKey(_)));
    }

    #[test]
    fn localai_allows_missing_api_key() {
        assert!(create_provider(ProviderKind::LocalAI, None, None, None).is_ok());
    }
}
