use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use serde_json::json;

use forge_common::ForgeError;

use crate::sse::parse_sse_stream;
use crate::types::*;
use crate::{error, Provider, ValidationConfig};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";

pub fn default_models() -> Vec<ModelInfo> {
    vec![
        ModelInfo {
            id: "gemini-2.5-flash".into(),
            name: "Gemini 2.5 Flash".into(),
            provider: "gemini".into(),
            context_window: 1_048_576,
            max_output_tokens: 65_536,
            supports_tools: true,
            supports_streaming: true,
            supports_vision: true,
            input_price_per_m: 0.3,
            output_price_per_m: 2.5,
            cache_read_price_per_m: 0.075,
            tier: ModelTier::Medium,
            thinking: Some(ThinkingSupport::gemini_levels()),
        },
        ModelInfo {
            id: "gemini-2.5-pro".into(),
            name: "Gemini 2.5 Pro".into(),
            provider: "gemini".into(),
            context_window: 1_048_576,
            max_output_tokens: 65_536,
            supports_tools: true,
            supports_streaming: true,
            supports_vision: true,
            input_price_per_m: 1.25,
            output_price_per_m: 10.0,
            cache_read_price_per_m: 0.31,
            tier: ModelTier::High,
            thinking: Some(ThinkingSupport::gemini_levels()),
        },
    ]
}

pub struct GeminiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    default_model: String,
    models: Vec<ModelInfo>,
}

impl GeminiProvider {
    pub fn new(api_key: String, base_url: Option<String>, model: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key,
            default_model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            models: default_models(),
        }
    }

    fn model_name<'a>(&'a self, request: &'a ChatRequest) -> &'a str {
        if request.model.is_empty() {
            &self.default_model
        } else {
            &request.model
        }
    }

    fn build_contents(&self, request: &ChatRequest) -> Vec<serde_json::Value> {
        request
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|msg| {
                let role = match msg.role {
                    Role::Assistant => "model",
                    _ => "user",
                };
                let parts = match &msg.content {
                    MessageContent::Text(text) => vec![json!({"text": text})],
                    MessageContent::Parts(parts) => parts
                        .iter()
                        .map(|p| match p {
                            ContentPart::Text { text } => json!({"text": text}),
                            ContentPart::Image { media_type, data } => json!({
                                "inlineData": {"mimeType": media_type, "data": data}
                            }),
                            ContentPart::ToolUse { name, input, .. } => json!({
                                "functionCall": {"name": name, "args": input}
                            }),
                            ContentPart::ToolResult { tool_use_id, content } => json!({
                                "functionResponse": {"name": tool_use_id, "response": {"result": content}}
                            }),
                        })
                        .collect(),
                };
                json!({"role": role, "parts": parts})
            })
            .collect()
    }

    fn build_tools(&self, tools: &[ToolDefinition]) -> serde_json::Value {
        let declarations: Vec<serde_json::Value> = tools
            .iter()
            .map(|t| json!({"name": t.name, "description": t.description, "parameters": t.parameters}))
            .collect();
        json!([{"functionDeclarations": declarations}])
    }

    fn build_body(&self, request: &ChatRequest) -> serde_json::Value {
        let mut body = json!({"contents": self.build_contents(request)});
        if let Some(system) = &request.system {
            body["systemInstruction"] = json!({"parts": [{"text": system}]});
        }
        if !request.tools.is_empty() {
            body["tools"] = self.build_tools(&request.tools);
        }

        let mut config = json!({});
        if let Some(max_tokens) = request.max_tokens {
            config["maxOutputTokens"] = json!(max_tokens);
        }
        if let Some(temp) = request.temperature {
            config["temperature"] = json!(temp);
        }
        if let Some(thinking) = &request.thinking {
            if thinking.enabled {
                let mut tc = json!({});
                if let Some(budget) = thinking.budget_tokens {
                    tc["thinkingBudget"] = json!(budget);
                }
                config["thinkingConfig"] = tc;
            }
        }
        if !config.as_object().unwrap().is_empty() {
            body["generationConfig"] = config;
        }
        body
    }

    async fn send(&self, url: &str, body: &serde_json::Value) -> Result<reqwest::Response, ForgeError> {
        let resp = self
            .client
            .post(url)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| ForgeError::ProviderUnavailable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(error::from_http(status.as_u16(), body, None));
        }
        Ok(resp)
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn supported_models(&self) -> &[ModelInfo] {
        &self.models
    }

    fn validation(&self) -> ValidationConfig {
        ValidationConfig {
            require_model: true,
            require_user_prompt: true,
            require_system_prompt: false,
            min_temperature: Some(0.0),
            max_temperature: Some(2.0),
            min_max_tokens: Some(1),
        }
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ForgeError> {
        let model = self.model_name(request).to_string();
        let body = self.build_body(request);
        let url = format!("{}/models/{}:generateContent?key={}", self.base_url, model, self.api_key);
        let resp = self.send(&url, &body).await?;
        let data: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| error::malformed(format!("invalid generateContent JSON: {e}")))?;

        let content = data["candidates"][0]["content"]["parts"][0]["text"].as_str().unwrap_or("").to_string();

        Ok(ChatResponse {
            message: Message { role: Role::Assistant, content: MessageContent::Text(content) },
            usage: Some(Usage {
                input_tokens: data["usageMetadata"]["promptTokenCount"].as_u64().unwrap_or(0) as u32,
                output_tokens: data["usageMetadata"]["candidatesTokenCount"].as_u64().unwrap_or(0) as u32,
                cache_read_tokens: 0,
            }),
            finish_reason: data["candidates"][0]["finishReason"].as_str().map(String::from),
        })
    }

    async fn chat_stream(&self, request: &ChatRequest) -> Result<BoxStream<'static, Result<StreamEvent, ForgeError>>, ForgeError> {
        let model = self.model_name(request).to_string();
        let body = self.build_body(request);
        let url = format!("{}/models/{}:streamGenerateContent?alt=sse&key={}", self.base_url, model, self.api_key);
        let resp = self.send(&url, &body).await?;
        let sse_stream = parse_sse_stream(resp);

        let event_stream = sse_stream.filter_map(|result| async move {
            match result {
                Ok(sse) => {
                    let data: serde_json::Value = match serde_json::from_str(&sse.data) {
                        Ok(v) => v,
                        Err(e) => return Some(Err(error::malformed(format!("invalid SSE payload: {e}")))),
                    };
                    let parts = data["candidates"][0]["content"]["parts"].as_array()?;

                    for part in parts {
                        if let Some(text) = part["text"].as_str() {
                            return Some(Ok(StreamEvent::TextDelta(text.to_string())));
                        }
                        if part.get("functionCall").is_some() {
                            return Some(Ok(StreamEvent::ToolCallStart {
                                index: 0,
                                id: forge_common::new_id(),
                                name: part["functionCall"]["name"].as_str().unwrap_or("").to_string(),
                            }));
                        }
                    }

                    if let Some(reason) = data["candidates"][0]["finishReason"].as_str() {
                        return Some(Ok(StreamEvent::Done { finish_reason: Some(reason.to_string()) }));
                    }

                    None
                }
                Err(e) => Some(Err(e)),
            }
        });

        Ok(Box::pin(event_stream))
    }
}
