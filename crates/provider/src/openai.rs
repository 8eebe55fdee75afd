use crate::openai_compat::{OpenAiCompatProvider, ThinkingMode};
use crate::types::*;
use crate::ValidationConfig;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-5.3-codex";

pub fn default_models() -> Vec<ModelInfo> {
    vec![
        ModelInfo {
            id: "gpt-5.3-codex".into(),
            name: "GPT-5.3 Codex".into(),
            provider: "openai".into(),
            context_window: 400_000,
            max_output_tokens: 128_000,
            supports_tools: true,
            supports_streaming: true,
            supports_vision: true,
            input_price_per_m: 2.0,
            output_price_per_m: 8.0,
            cache_read_price_per_m: 0.5,
            tier: ModelTier::High,
            thinking: Some(ThinkingSupport::openai_reasoning()),
        },
        ModelInfo {
            id: "gpt-5.2".into(),
            name: "GPT-5.2".into(),
            provider: "openai".into(),
            context_window: 272_000,
            max_output_tokens: 100_000,
            supports_tools: true,
            supports_streaming: true,
            supports_vision: true,
            input_price_per_m: 2.0,
            output_price_per_m: 8.0,
            cache_read_price_per_m: 0.5,
            tier: ModelTier::Medium,
            thinking: Some(ThinkingSupport::openai_reasoning()),
        },
    ]
}

pub fn new(api_key: String, base_url: Option<String>, model: Option<String>) -> OpenAiCompatProvider {
    OpenAiCompatProvider::new(
        "openai",
        base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        Some(api_key),
        model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        default_models(),
        ThinkingMode::ReasoningEffort,
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
