use crate::{AuthError, Credential};

const ENV_VARS: &[(&str, &str)] = &[
    ("openai", "OPENAI_API_KEY"),
    ("gemini", "GEMINI_API_KEY"),
    ("openrouter", "OPENROUTER_API_KEY"),
    ("localai", "LOCALAI_API_KEY"),
    ("qwen", "DASHSCOPE_API_KEY"),
];

pub fn env_var_name(provider: &str) -> &str {
    ENV_VARS.iter().find(|(p, _)| *p == provider).map(|(_, v)| *v).unwrap_or("UNKNOWN_API_KEY")
}

pub fn from_env(provider: &str) -> Result<Credential, AuthError> {
    let var = env_var_name(provider);
    match std::env::var(var) {
        Ok(key) if !key.is_empty() => Ok(Credential::new(key)),
        _ => Err(AuthError::NoApiKey { provider: provider.to_string(), env_var: var.to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_provider_resolves_env_var_name() {
        assert_eq!(env_var_name("openai"), "OPENAI_API_KEY");
        assert_eq!(env_var_name("qwen"), "DASHSCOPE_API_KEY");
    }

    #[test]
    fn unknown_provider_falls_back() {
        assert_eq!(env_var_name("anthropic"), "UNKNOWN_API_KEY");
    }
}
