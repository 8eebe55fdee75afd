//! AI Provider Facade: a uniform request/stream interface over the closed
//! provider registry (openai, gemini, openrouter, localai, qwen), with
//! token estimation, live model-catalog refresh, and pricing lookup.

pub mod types;

pub mod gemini;
pub mod localai;
pub mod openai;
pub mod openai_compat;
pub mod openrouter;
pub mod qwen;

mod error;
mod facade;
mod list_models;
mod model_cache;
mod registry;
mod sse;
mod validation;

pub use error::{from_http, malformed};
pub use facade::{AiFacade, FinishReason, Pricing, StreamChunk};
pub use registry::{create_provider, ProviderKind};
pub use types::*;
pub use validation::ValidationConfig;

use async_trait::async_trait;
use futures::stream::BoxStream;
use forge_common::ForgeError;

#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;
    fn supported_models(&self) -> &[ModelInfo];

    fn model_for_tier(&self, tier: ModelTier) -> Option<&ModelInfo> {
        let models = self.supported_models();
        models.iter().find(|m| m.tier == tier).or_else(|| models.first())
    }

    /// Synchronous pre-I/O request gate; the default is the common-case
    /// bounds every provider in the registry happens to share.
    fn validation(&self) -> ValidationConfig {
        ValidationConfig::default()
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ForgeError>;

    async fn chat_stream(&self, request: &ChatRequest) -> Result<BoxStream<'static, Result<StreamEvent, ForgeError>>, ForgeError>;
}
