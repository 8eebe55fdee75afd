//! Shared request/response plumbing for the four providers that speak an
//! OpenAI-compatible `/chat/completions` wire format: OpenAI itself,
//! OpenRouter, LocalAI, and Qwen's DashScope compatible-mode endpoint. Each
//! of those modules just supplies a base URL, default model, model catalog,
//! and a few provider-specific headers/body fields; this module owns the
//! request building, SSE decoding, and error translation they all share.

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use serde_json::json;

use forge_common::ForgeError;

use crate::sse::parse_sse_stream;
use crate::types::*;
use crate::{error, Provider, ValidationConfig};

/// How a provider wants its reasoning/thinking knob expressed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThinkingMode {
    None,
    ReasoningEffort,
    EnableThinking,
}

pub struct OpenAiCompatProvider {
    provider_name: &'static str,
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    extra_headers: Vec<(&'static str, String)>,
    default_model: String,
    models: Vec<ModelInfo>,
    thinking_mode: ThinkingMode,
    validation: ValidationConfig,
}

impl OpenAiCompatProvider {
    pub fn new(
        provider_name: &'static str,
        base_url: String,
        api_key: Option<String>,
        default_model: String,
        models: Vec<ModelInfo>,
        thinking_mode: ThinkingMode,
    ) -> Self {
        Self {
            provider_name,
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .unwrap_or_default(),
            base_url,
            api_key,
            extra_headers: Vec::new(),
            default_model,
            models,
            thinking_mode,
            validation: ValidationConfig::default(),
        }
    }

    pub fn with_header(mut self, name: &'static str, value: String) -> Self {
        self.extra_headers.push((name, value));
        self
    }

    pub fn with_validation(mut self, validation: ValidationConfig) -> Self {
        self.validation = validation;
        self
    }

    fn request(&self, path: &str) -> reqwest::RequestBuilder {
        let mut req = self.client.post(format!("{}{path}", self.base_url));
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {key}"));
        }
        for (name, value) in &self.extra_headers {
            req = req.header(*name, value.clone());
        }
        req
    }

    fn model_name<'a>(&'a self, request: &'a ChatRequest) -> &'a str {
        if request.model.is_empty() {
            &self.default_model
        } else {
            &request.model
        }
    }

    fn build_body(&self, model: &str, request: &ChatRequest, stream: bool) -> serde_json::Value {
        let mut body = json!({
            "model": model,
            "messages": build_messages(request),
        });
        if stream {
            body["stream"] = json!(true);
            body["stream_options"] = json!({"include_usage": true});
        }
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if let Some(temp) = request.temperature {
            body["temperature"] = json!(temp);
        }
        if !request.tools.is_empty() {
            body["tools"] = json!(build_tools(&request.tools));
        }

        let thinking_enabled = request.thinking.as_ref().map(|t| t.enabled).unwrap_or(false);
        match (self.thinking_mode, thinking_enabled) {
            (ThinkingMode::ReasoningEffort, true) => {
                let effort = request
                    .thinking
                    .as_ref()
                    .and_then(|t| t.reasoning_effort.as_deref())
                    .unwrap_or("high");
                body["reasoning_effort"] = json!(effort);
            }
            (ThinkingMode::EnableThinking, _) => {
                body["enable_thinking"] = json!(thinking_enabled);
                if let Some(budget) = request.thinking.as_ref().and_then(|t| t.budget_tokens) {
                    body["thinking_budget"] = json!(budget);
                }
            }
            _ => {}
        }

        body
    }

    async fn send(&self, body: &serde_json::Value) -> Result<reqwest::Response, ForgeError> {
        let resp = self
            .request("/chat/completions")
            .json(body)
            .send()
            .await
            .map_err(|e| ForgeError::ProviderUnavailable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body = resp.text().await.unwrap_or_default();
            return Err(error::from_http(status.as_u16(), body, retry_after.as_deref()));
        }
        Ok(resp)
    }
}

pub fn build_messages(request: &ChatRequest) -> Vec<serde_json::Value> {
    let mut msgs = Vec::new();
    if let Some(system) = &request.system {
        msgs.push(json!({"role": "system", "content": system}));
    }
    for msg in &request.messages {
        msgs.push(message_json(msg));
    }
    msgs
}

fn message_json(msg: &Message) -> serde_json::Value {
    match &msg.content {
        MessageContent::Text(text) => json!({"role": role_str(&msg.role), "content": text}),
        MessageContent::Parts(parts) => {
            let content: Vec<serde_json::Value> = parts
                .iter()
                .map(|p| match p {
                    ContentPart::Text { text } => json!({"type": "text", "text": text}),
                    ContentPart::Image { media_type, data } => json!({
                        "type": "image_url",
                        "image_url": {"url": format!("data:{media_type};base64,{data}")}
                    }),
                    ContentPart::ToolUse { id, name, input } => json!({
                        "type": "function",
                        "id": id,
                        "function": {"name": name, "arguments": input.to_string()},
                    }),
                    ContentPart::ToolResult { tool_use_id, content } => json!({
                        "role": "tool",
                        "tool_call_id": tool_use_id,
                        "content": content,
                    }),
                })
                .collect();
            json!({"role": role_str(&msg.role), "content": content})
        }
    }
}

pub fn build_tools(tools: &[ToolDefinition]) -> Vec<serde_json::Value> {
    tools
        .iter()
        .map(|t| {
            json!({
                "type": "function",
                "function": {
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters,
                }
            })
        })
        .collect()
}

fn role_str(role: &Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        self.provider_name
    }

    fn supported_models(&self) -> &[ModelInfo] {
        &self.models
    }

    fn validation(&self) -> ValidationConfig {
        self.validation.clone()
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ForgeError> {
        let model = self.model_name(request).to_string();
        let body = self.build_body(&model, request, false);
        let resp = self.send(&body).await?;
        let data: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| error::malformed(format!("invalid chat completion JSON: {e}")))?;

        let choice = &data["choices"][0];
        let content = choice["message"]["content"].as_str().unwrap_or("").to_string();
        let cached = data["usage"]["prompt_tokens_details"]["cached_tokens"].as_u64().unwrap_or(0) as u32;

        Ok(ChatResponse {
            message: Message { role: Role::Assistant, content: MessageContent::Text(content) },
            usage: Some(Usage {
                input_tokens: data["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
                output_tokens: data["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
                cache_read_tokens: cached,
            }),
            finish_reason: choice["finish_reason"].as_str().map(String::from),
        })
    }

    async fn chat_stream(&self, request: &ChatRequest) -> Result<BoxStream<'static, Result<StreamEvent, ForgeError>>, ForgeError> {
        let model = self.model_name(request).to_string();
        let body = self.build_body(&model, request, true);
        let resp = self.send(&body).await?;
        let sse_stream = parse_sse_stream(resp);

        let event_stream = sse_stream.map(|result| {
            result.and_then(|sse| {
                let data: serde_json::Value = serde_json::from_str(&sse.data)
                    .map_err(|e| error::malformed(format!("invalid SSE payload: {e}")))?;

                if let Some(usage) = data.get("usage").filter(|u| u.is_object()) {
                    let cached = usage["prompt_tokens_details"]["cached_tokens"].as_u64().unwrap_or(0) as u32;
                    return Ok(StreamEvent::Usage(Usage {
                        input_tokens: usage["prompt_tokens"].as_u64().unwrap_or(0) as u32,
                        output_tokens: usage["completion_tokens"].as_u64().unwrap_or(0) as u32,
                        cache_read_tokens: cached,
                    }));
                }

                if let Some(reason) = data["choices"][0]["finish_reason"].as_str() {
                    return Ok(StreamEvent::Done { finish_reason: Some(reason.to_string()) });
                }

                let delta = &data["choices"][0]["delta"];
                if let Some(content) = delta["content"].as_str() {
                    return Ok(StreamEvent::TextDelta(content.to_string()));
                }

                if let Some(tool_calls) = delta["tool_calls"].as_array() {
                    for tc in tool_calls {
                        let index = tc["index"].as_u64().unwrap_or(0) as u32;
                        if let Some(function) = tc.get("function") {
                            if let Some(name) = function["name"].as_str() {
                                return Ok(StreamEvent::ToolCallStart {
                                    index,
                                    id: tc["id"].as_str().unwrap_or("").to_string(),
                                    name: name.to_string(),
                                });
                            }
                            if let Some(args) = function["arguments"].as_str() {
                                return Ok(StreamEvent::ToolCallDelta { index, arguments_delta: args.to_string() });
                            }
                        }
                    }
                }

                Ok(StreamEvent::TextDelta(String::new()))
            })
        });

        Ok(Box::pin(event_stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_messages_prepends_system() {
        let request = ChatRequest {
            system: Some("be terse".into()),
            messages: vec![Message { role: Role::User, content: MessageContent::Text("hi".into()) }],
            ..Default::default()
        };
        let msgs = build_messages(&request);
        assert_eq!(msgs[0]["role"], "system");
        assert_eq!(msgs[1]["role"], "user");
    }
}
