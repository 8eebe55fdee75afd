//! LocalAI exposes an OpenAI-compatible endpoint in front of whatever model
//! the operator has loaded; there's no fixed catalog or per-token pricing to
//! report, and the API key is optional since most deployments run unauthenticated
//! on localhost.

use crate::openai_compat::{OpenAiCompatProvider, ThinkingMode};
use crate::types::*;
use crate::ValidationConfig;

const DEFAULT_BASE_URL: &str = "http://localhost:8080/v1";
const DEFAULT_MODEL: &str = "local-model";

pub fn default_models() -> Vec<ModelInfo> {
    vec![ModelInfo {
        id: DEFAULT_MODEL.into(),
        name: "Local model".into(),
        provider: "localai".into(),
        context_window: 32_768,
        max_output_tokens: 4_096,
        supports_tools: true,
        supports_streaming: true,
        supports_vision: false,
        input_price_per_m: 0.0,
        output_price_per_m: 0.0,
        cache_read_price_per_m: 0.0,
        tier: ModelTier::Low,
        thinking: None,
    }]
}

pub fn new(api_key: Option<String>, base_url: Option<String>, model: Option<String>) -> OpenAiCompatProvider {
    OpenAiCompatProvider::new(
        "localai",
        base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        api_key,
        model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        default_models(),
        ThinkingMode::None,
    )
    .with_validation(ValidationConfig {
        require_model: true,
        require_user_prompt: true,
        require_system_prompt: false,
        min_temperature: Some(0.0),
        max_temperature: Some(2.0),
        min_max_tokens: Some(1),
    })
}
