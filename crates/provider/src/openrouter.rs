//! OpenRouter speaks the same `/chat/completions` shape as OpenAI and routes
//! the `model` field to whichever upstream it names; the only thing this
//! provider adds on top of [`crate::openai_compat`] is the attribution
//! headers OpenRouter asks routed requests to carry.

use crate::openai_compat::{OpenAiCompatProvider, ThinkingMode};
use crate::types::*;
use crate::ValidationConfig;

const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
const DEFAULT_MODEL: &str = "anthropic/claude-sonnet-4.5";

pub fn default_models() -> Vec<ModelInfo> {
    vec![
        ModelInfo {
            id: "anthropic/claude-sonnet-4.5".into(),
            name: "Claude Sonnet 4.5 (OpenRouter)".into(),
            provider: "openrouter".into(),
            context_window: 200_000,
            max_output_tokens: 64_000,
            supports_tools: true,
            supports_streaming: true,
            supports_vision: true,
            input_price_per_m: 3.0,
            output_price_per_m: 15.0,
            cache_read_price_per_m: 0.3,
            tier: ModelTier::High,
            thinking: None,
        },
        ModelInfo {
            id: "deepseek/deepseek-v3.2".into(),
            name: "DeepSeek V3.2 (OpenRouter)".into(),
            provider: "openrouter".into(),
            context_window: 128_000,
            max_output_tokens: 32_000,
            supports_tools: true,
            supports_streaming: true,
            supports_vision: false,
            input_price_per_m: 0.27,
            output_price_per_m: 1.1,
            cache_read_price_per_m: 0.0,
            tier: ModelTier::Medium,
            thinking: None,
        },
    ]
}

pub fn new(api_key: String, base_url: Option<String>, model: Option<String>) -> OpenAiCompatProvider {
    OpenAiCompatProvider::new(
        "openrouter",
        base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        Some(api_key),
        model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        default_models(),
        ThinkingMode::None,
    )
    .with_header("HTTP-Referer", "https://github.com/forge/worker-factory".into())
    .with_header("X-Title", "AI Worker Factory".into())
    .with_validation(ValidationConfig {
        require_model: true,
        require_user_prompt: true,
        require_system_prompt: false,
        min_temperature: Some(0.0),
        max_temperature: Some(2.0),
        min_max_tokens: Some(1),
    })
}
