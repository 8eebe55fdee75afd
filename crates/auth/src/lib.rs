//! Credential resolution for the closed provider registry. There is no
//! OAuth here -- every provider in the registry is reached with a bearer
//! API key, sourced from `settings.json` or an environment variable.

pub mod api_key;

mod error;

pub use error::AuthError;

/// The one credential shape this system deals with: a bearer API key.
#[derive(Debug, Clone)]
pub struct Credential(String);

impl Credential {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn header_value(&self) -> &str {
        &self.0
    }
}

/// Resolves a provider's credential: an explicit `config_key` (from
/// `settings.json`'s `selectedProvider`/`selectedModels` entry) wins, else
/// the provider's environment variable. Returns an error naming the
/// expected env var when neither is set.
pub fn resolve_credential(provider: &str, config_key: Option<&str>) -> Result<Credential, AuthError> {
    if let Some(key) = config_key.filter(|k| !k.is_empty()) {
        return Ok(Credential::new(key));
    }
    api_key::from_env(provider)
}

/// Same resolution, but a missing credential is `None` rather than an
/// error -- the one registry entry this applies to is `localai`, which runs
/// unauthenticated by default.
pub fn resolve_optional_credential(provider: &str, config_key: Option<&str>) -> Option<Credential> {
    resolve_credential(provider, config_key).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_key_takes_priority_over_env() {
        let cred = resolve_credential("openai", Some("sk-configured")).unwrap();
        assert_eq!(cred.header_value(), "sk-configured");
    }

    #[test]
    fn missing_credential_is_none_for_optional_resolution() {
        std::env::remove_var("LOCALAI_API_KEY");
        assert!(resolve_optional_credential("localai", None).is_none());
    }
}
