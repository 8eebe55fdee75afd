#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("no API key found for provider '{provider}'. Set {env_var} or configure selectedProvider credentials in settings.json")]
    NoApiKey { provider: String, env_var: String },

    #[error("provider '{0}' is not part of the registry")]
    UnknownProvider(String),
}
