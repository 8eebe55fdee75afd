use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    Low,
    Medium,
    High,
}

/// How a model's extended-thinking / reasoning-effort knob is expressed on
/// the wire; each provider exposes a different shape for the same idea.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ThinkingSupport {
    ReasoningEffort { levels: Vec<String> },
    BudgetTokens { max: u32 },
    ThinkingLevel { levels: Vec<String> },
}

impl ThinkingSupport {
    pub fn openai_reasoning() -> Self {
        ThinkingSupport::ReasoningEffort {
            levels: vec!["low".into(), "medium".into(), "high".into()],
        }
    }

    pub fn gemini_levels() -> Self {
        ThinkingSupport::ThinkingLevel {
            levels: vec!["low".into(), "medium".into(), "high".into()],
        }
    }

    pub fn qwen_budget() -> Self {
        ThinkingSupport::BudgetTokens { max: 38_912 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    pub provider: String,
    pub context_window: u32,
    pub max_output_tokens: u32,
    pub supports_tools: bool,
    pub supports_streaming: bool,
    pub supports_vision: bool,
    pub input_price_per_m: f64,
    pub output_price_per_m: f64,
    pub cache_read_price_per_m: f64,
    pub tier: ModelTier,
    pub thinking: Option<ThinkingSupport>,
}

impl ModelInfo {
    pub fn cost_usd(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        let input = f64::from(input_tokens) / 1_000_000.0 * self.input_price_per_m;
        let output = f64::from(output_tokens) / 1_000_000.0 * self.output_price_per_m;
        input + output
    }

    pub fn has_thinking(&self) -> bool {
        self.thinking.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    pub fn as_text(&self) -> String {
        match self {
            MessageContent::Text(t) => t.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.clone()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(""),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ContentPart {
    Text {
        text: String,
    },
    Image {
        media_type: String,
        data: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThinkingConfig {
    pub enabled: bool,
    pub reasoning_effort: Option<String>,
    pub budget_tokens: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub tools: Vec<ToolDefinition>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub system: Option<String>,
    #[serde(default)]
    pub stream: bool,
    pub thinking: Option<ThinkingConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cache_read_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message: Message,
    pub usage: Option<Usage>,
    pub finish_reason: Option<String>,
}

/// Provider-internal streaming events, emitted before being folded into the
/// facade's normalized `StreamChunk`.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    TextDelta(String),
    ToolCallStart { index: u32, id: String, name: String },
    ToolCallDelta { index: u32, arguments_delta: String },
    Usage(Usage),
    Done { finish_reason: Option<String> },
}
