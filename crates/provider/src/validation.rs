use forge_common::ForgeError;

use crate::types::ChatRequest;

/// Per-provider gate checked before any I/O: `requireModel`/`requireUserPrompt`/
/// `requireSystemPrompt` toggle presence checks, the temperature bounds and
/// `minMaxTokens` bound range checks. A provider with no real restrictions
/// (e.g. LocalAI) can still supply one with every field relaxed.
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    pub require_model: bool,
    pub require_user_prompt: bool,
    pub require_system_prompt: bool,
    pub min_temperature: Option<f32>,
    pub max_temperature: Option<f32>,
    pub min_max_tokens: Option<u32>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            require_model: true,
            require_user_prompt: true,
            require_system_prompt: false,
            min_temperature: Some(0.0),
            max_temperature: Some(2.0),
            min_max_tokens: Some(1),
        }
    }
}

pub fn validate(config: &ValidationConfig, request: &ChatRequest) -> Result<(), ForgeError> {
    if config.require_model && request.model.trim().is_empty() {
        return Err(ForgeError::PolicyViolation("model is required".into()));
    }
    if config.require_user_prompt && !request.messages.iter().any(|m| m.role == crate::types::Role::User) {
        return Err(ForgeError::PolicyViolation("at least one user message is required".into()));
    }
    if config.require_system_prompt && request.system.as_deref().map(str::trim).unwrap_or("").is_empty() {
        return Err(ForgeError::PolicyViolation("system prompt is required".into()));
    }
    if let Some(temp) = request.temperature {
        if let Some(min) = config.min_temperature {
            if temp < min {
                return Err(ForgeError::PolicyViolation(format!("temperature {temp} below minimum {min}")));
            }
        }
        if let Some(max) = config.max_temperature {
            if temp > max {
                return Err(ForgeError::PolicyViolation(format!("temperature {temp} above maximum {max}")));
            }
        }
    }
    if let Some(max_tokens) = request.max_tokens {
        if let Some(min) = config.min_max_tokens {
            if max_tokens < min {
                return Err(ForgeError::PolicyViolation(format!("max_tokens {max_tokens} below minimum {min}")));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Message, MessageContent, Role};

    fn request() -> ChatRequest {
        ChatRequest {
            model: "gpt-5.2".into(),
            messages: vec![Message { role: Role::User, content: MessageContent::Text("hi".into()) }],
            ..Default::default()
        }
    }

    #[test]
    fn rejects_missing_model() {
        let mut req = request();
        req.model.clear();
        assert!(validate(&ValidationConfig::default(), &req).is_err());
    }

    #[test]
    fn rejects_missing_user_message() {
        let req = ChatRequest { model: "gpt-5.2".into(), ..Default::default() };
        assert!(validate(&ValidationConfig::default(), &req).is_err());
    }

    #[test]
    fn rejects_temperature_out_of_range() {
        let mut req = request();
        req.temperature = Some(3.0);
        assert!(validate(&ValidationConfig::default(), &req).is_err());
    }

    #[test]
    fn accepts_well_formed_request() {
        assert!(validate(&ValidationConfig::default(), &request()).is_ok());
    }
}
