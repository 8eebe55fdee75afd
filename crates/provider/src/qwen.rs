//! Qwen via Alibaba DashScope's OpenAI-compatible-mode endpoint; the one
//! wire difference from plain OpenAI is the `enable_thinking`/`thinking_budget`
//! pair instead of a `reasoning_effort` string.

use crate::openai_compat::{OpenAiCompatProvider, ThinkingMode};
use crate::types::*;
use crate::ValidationConfig;

const DEFAULT_BASE_URL: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1";
const DEFAULT_MODEL: &str = "qwen3-max";

pub fn default_models() -> Vec<ModelInfo> {
    vec![
        ModelInfo {
            id: "qwen3-max".into(),
            name: "Qwen3 Max".into(),
            provider: "qwen".into(),
            context_window: 256_000,
            max_output_tokens: 32_768,
            supports_tools: true,
            supports_streaming: true,
            supports_vision: false,
            input_price_per_m: 1.2,
            output_price_per_m: 6.0,
            cache_read_price_per_m: 0.24,
            tier: ModelTier::High,
            thinking: Some(ThinkingSupport::qwen_budget()),
        },
        ModelInfo {
            id: "qwen3-coder-plus".into(),
            name: "Qwen3 Coder Plus".into(),
            provider: "qwen".into(),
            context_window: 1_000_000,
            max_output_tokens: 65_536,
            supports_tools: true,
            supports_streaming: true,
            supports_vision: false,
            input_price_per_m: 1.0,
            output_price_per_m: 5.0,
            cache_read_price_per_m: 0.2,
            tier: ModelTier::Medium,
            thinking: Some(ThinkingSupport::qwen_budget()),
        },
    ]
}

pub fn new(api_key: String, base_url: Option<String>, model: Option<String>) -> OpenAiCompatProvider {
    OpenAiCompatProvider::new(
        "qwen",
        base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        Some(api_key),
        model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        default_models(),
        ThinkingMode::EnableThinking,
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
