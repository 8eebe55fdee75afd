use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use serde::{Deserialize, Serialize};

use forge_common::{Cancellation, ForgeError};

use crate::model_cache::ModelCache;
use crate::types::{ChatRequest, ModelInfo, StreamEvent};
use crate::{list_models, validation, Provider};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    Error,
    Canceled,
}

fn normalize_finish_reason(raw: Option<&str>) -> FinishReason {
    let lower = raw.unwrap_or("stop").to_lowercase();
    if lower.contains("length") || lower.contains("max_token") {
        FinishReason::Length
    } else if lower.contains("filter") || lower.contains("safety") {
        FinishReason::ContentFilter
    } else {
        FinishReason::Stop
    }
}

/// One chunk of a streamed generation. `done=true` always carries a
/// `finishReason`; `error` is set only on `finishReason: error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamChunk {
    pub content: String,
    pub done: bool,
    pub tokens_used: u32,
    pub finish_reason: Option<FinishReason>,
    pub error: Option<String>,
}

impl StreamChunk {
    fn delta(content: String) -> Self {
        Self { content, done: false, tokens_used: 0, finish_reason: None, error: None }
    }

    fn done(tokens_used: u32, reason: FinishReason) -> Self {
        Self { content: String::new(), done: true, tokens_used, finish_reason: Some(reason), error: None }
    }

    fn failed(error: ForgeError) -> Self {
        let canceled = error.is_canceled();
        Self {
            content: String::new(),
            done: true,
            tokens_used: 0,
            finish_reason: Some(if canceled { FinishReason::Canceled } else { FinishReason::Error }),
            error: Some(error.to_string()),
        }
    }
}

/// Currency conversion is a flat table, not a live feed -- there is no
/// exchange-rate source anywhere in this system, so non-USD pricing is a
/// best-effort approximation against a fixed snapshot rather than a quote.
const FX_TO_USD: &[(&str, f64)] = &[("USD", 1.0), ("EUR", 0.92), ("GBP", 0.79)];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pricing {
    pub currency: String,
    pub input_price_per_m: f64,
    pub output_price_per_m: f64,
    pub cache_read_price_per_m: f64,
}

/// Routes `Generate`/`Stream`/`EstimateTokens`/`RefreshModels`/`GetPricing`
/// calls to the registered provider by name, validating synchronously before
/// any I/O and folding each provider's raw stream into normalized chunks.
pub struct AiFacade {
    providers: HashMap<String, Arc<dyn Provider>>,
    model_cache: ModelCache,
}

impl Default for AiFacade {
    fn default() -> Self {
        Self::new()
    }
}

impl AiFacade {
    pub fn new() -> Self {
        Self { providers: HashMap::new(), model_cache: ModelCache::new() }
    }

    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    fn get(&self, provider: &str) -> Result<&Arc<dyn Provider>, ForgeError> {
        self.providers.get(provider).ok_or_else(|| ForgeError::ProviderUnavailable(format!("provider '{provider}' is not registered")))
    }

    /// Current model catalog for `provider`: the live-refreshed cache if one
    /// exists and hasn't expired, else the provider's own hardcoded list.
    fn models_for(&self, provider: &str) -> Result<Vec<ModelInfo>, ForgeError> {
        let p = self.get(provider)?;
        Ok(self.model_cache.get(provider).unwrap_or_else(|| p.supported_models().to_vec()))
    }

    pub async fn generate(&self, provider: &str, request: &ChatRequest, cancellation: &Cancellation) -> Result<String, ForgeError> {
        let p = self.get(provider)?;
        validation::validate(&p.validation(), request)?;
        if cancellation.is_canceled() {
            return Err(ForgeError::Canceled);
        }
        let response = p.chat(request).await?;
        Ok(response.message.content.as_text())
    }

    /// Streams `request` through `provider`, invoking `on_chunk` once per
    /// normalized `StreamChunk` in arrival order. Cancellation is checked at
    /// each chunk boundary; when tripped, a single terminal `Canceled` chunk
    /// is delivered and the underlying provider stream is dropped.
    pub async fn stream<F>(&self, provider: &str, request: &ChatRequest, cancellation: &Cancellation, mut on_chunk: F) -> Result<(), ForgeError>
    where
        F: FnMut(StreamChunk),
    {
        let p = self.get(provider)?;
        validation::validate(&p.validation(), request)?;
        if cancellation.is_canceled() {
            on_chunk(StreamChunk::failed(ForgeError::Canceled));
            return Err(ForgeError::Canceled);
        }

        let mut events = p.chat_stream(request).await?;
        let mut tokens_used = 0u32;

        loop {
            if cancellation.is_canceled() {
                on_chunk(StreamChunk::failed(ForgeError::Canceled));
                return Err(ForgeError::Canceled);
            }

            let event = match events.next().await {
                Some(event) => event,
                None => {
                    on_chunk(StreamChunk::done(tokens_used, FinishReason::Stop));
                    return Ok(());
                }
            };

            match event {
                Ok(StreamEvent::TextDelta(text)) => {
                    if !text.is_empty() {
                        on_chunk(StreamChunk::delta(text));
                    }
                }
                Ok(StreamEvent::ToolCallStart { .. }) | Ok(StreamEvent::ToolCallDelta { .. }) => {}
                Ok(StreamEvent::Usage(usage)) => {
                    tokens_used = usage.input_tokens + usage.output_tokens;
                }
                Ok(StreamEvent::Done { finish_reason }) => {
                    on_chunk(StreamChunk::done(tokens_used, normalize_finish_reason(finish_reason.as_deref())));
                    return Ok(());
                }
                Err(e) => {
                    on_chunk(StreamChunk::failed(e));
                    return Ok(());
                }
            }
        }
    }

    /// Heuristic `len/charsPerToken + safetyBuffer` estimate over the
    /// request's system prompt, messages, and tool schemas, using the
    /// provider-named profile from the shared context-builder registry.
    pub fn estimate_tokens(&self, provider: &str, request: &ChatRequest) -> usize {
        let registry = forge_context::TokenProfileRegistry::default();
        let profile = registry.get(provider);

        let mut text = request.system.clone().unwrap_or_default();
        for message in &request.messages {
            text.push_str(&message.content.as_text());
        }
        for tool in &request.tools {
            text.push_str(&tool.name);
            text.push_str(&tool.description);
        }
        forge_context::estimate(&text, profile)
    }

    pub async fn refresh_models(&mut self, provider: &str, api_key: Option<&str>, base_url: &str) -> Result<(), ForgeError> {
        let p = self.get(provider)?;
        let fetched = list_models::fetch_models(provider, base_url, api_key).await?;
        if fetched.is_empty() {
            return Ok(());
        }
        let merged = list_models::merge_models(fetched, p.supported_models());
        self.model_cache.set(provider, merged);
        Ok(())
    }

    pub fn get_pricing(&self, provider: &str, model: &str, currency: &str) -> Result<Pricing, ForgeError> {
        let models = self.models_for(provider)?;
        let info = models
            .iter()
            .find(|m| m.id == model)
            .ok_or_else(|| ForgeError::Other(anyhow::anyhow!("unknown model '{model}' for provider '{provider}'")))?;

        let rate = FX_TO_USD
            .iter()
            .find(|(code, _)| code.eq_ignore_ascii_case(currency))
            .map(|(_, rate)| *rate)
            .ok_or_else(|| ForgeError::Other(anyhow::anyhow!("unsupported currency '{currency}'")))?;

        Ok(Pricing {
            currency: currency.to_uppercase(),
            input_price_per_m: info.input_price_per_m / rate,
            output_price_per_m: info.output_price_per_m / rate,
            cache_read_price_per_m: info.cache_read_price_per_m / rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Message, MessageContent, Role};

    struct FakeProvider;

    #[async_trait::async_trait]
    impl Provider for FakeProvider {
        fn name(&self) -> &str {
            "fake"
        }

        fn supported_models(&self) -> &[ModelInfo] {
            static MODELS: std::sync::OnceLock<Vec<ModelInfo>> = std::sync::OnceLock::new();
            MODELS.get_or_init(|| {
                vec![ModelInfo {
                    id: "fake-1".into(),
                    name: "Fake 1".into(),
                    provider: "fake".into(),
                    context_window: 1000,
                    max_output_tokens: 100,
                    supports_tools: false,
                    supports_streaming: true,
                    supports_vision: false,
                    input_price_per_m: 1.0,
                    output_price_per_m: 2.0,
                    cache_read_price_per_m: 0.0,
                    tier: crate::types::ModelTier::Low,
                    thinking: None,
                }]
            })
        }

        async fn chat(&self, _request: &ChatRequest) -> Result<crate::types::ChatResponse, ForgeError> {
            Ok(crate::types::ChatResponse {
                message: crate::types::Message { role: Role::Assistant, content: MessageContent::Text("hi there".into()) },
                usage: None,
                finish_reason: Some("stop".into()),
            })
        }

        async fn chat_stream(
            &self,
            _request: &ChatRequest,
        ) -> Result<futures::stream::BoxStream<'static, Result<StreamEvent, ForgeError>>, ForgeError> {
            let events = vec![Ok(StreamEvent::TextDelta("hi".into())), Ok(StreamEvent::Done { finish_reason: Some("stop".into()) })];
            Ok(Box::pin(futures::stream::iter(events)))
        }
    }

    fn request() -> ChatRequest {
        ChatRequest {
            model: "fake-1".into(),
            messages: vec![Message { role: Role::User, content: MessageContent::Text("hello".into()) }],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn generate_returns_text() {
        let mut facade = AiFacade::new();
        facade.register(Arc::new(FakeProvider));
        let text = facade.generate("fake", &request(), &Cancellation::new()).await.unwrap();
        assert_eq!(text, "hi there");
    }

    #[tokio::test]
    async fn stream_delivers_delta_then_done() {
        let mut facade = AiFacade::new();
        facade.register(Arc::new(FakeProvider));
        let mut chunks = Vec::new();
        facade
            .stream("fake", &request(), &Cancellation::new(), |c| chunks.push(c))
            .await
            .unwrap();
        assert_eq!(chunks[0].content, "hi");
        assert!(chunks.last().unwrap().done);
    }

    #[tokio::test]
    async fn stream_reports_canceled_chunk_when_already_canceled() {
        let mut facade = AiFacade::new();
        facade.register(Arc::new(FakeProvider));
        let cancellation = Cancellation::new();
        cancellation.cancel();
        let mut chunks = Vec::new();
        let result = facade.stream("fake", &request(), &cancellation, |c| chunks.push(c)).await;
        assert!(result.is_err());
        assert_eq!(chunks[0].finish_reason, Some(FinishReason::Canceled));
    }

    #[test]
    fn pricing_converts_by_fixed_rate() {
        let mut facade = AiFacade::new();
        facade.register(Arc::new(FakeProvider));
        let usd = facade.get_pricing("fake", "fake-1", "USD").unwrap();
        assert_eq!(usd.input_price_per_m, 1.0);
        let eur = facade.get_pricing("fake", "fake-1", "EUR").unwrap();
        assert!(eur.input_price_per_m > usd.input_price_per_m);
    }

    #[test]
    fn estimate_tokens_counts_messages_and_system() {
        let mut facade = AiFacade::new();
        facade.register(Arc::new(FakeProvider));
        let estimate = facade.estimate_tokens("fake", &request());
        assert!(estimate > 0);
    }
}
