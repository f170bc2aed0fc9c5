//! The provider-agnostic streaming chat interface.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use forge_core::Message;

use crate::error::LlmResult;
use crate::types::{LlmResponse, LlmToolDefinition, StreamEvent};

/// A boxed stream of streaming chat events.
pub type StreamBox = Pin<Box<dyn Stream<Item = LlmResult<StreamEvent>> + Send>>;

/// Implemented by every concrete LLM backend (Claude, OpenAI-compatible,
/// and any future addition). The agent runtime's operation loop depends
/// only on this trait, never on a concrete provider.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// The provider's display name.
    fn name(&self) -> &str;

    /// The model identifier currently in use.
    fn model(&self) -> &str;

    /// Start a streaming completion, yielding events as the model
    /// generates output.
    async fn stream(
        &self,
        messages: &[Message],
        tools: &[LlmToolDefinition],
        system: &str,
    ) -> LlmResult<StreamBox>;

    /// Run a completion to conclusion without streaming.
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[LlmToolDefinition],
        system: &str,
    ) -> LlmResult<LlmResponse>;

    /// A single-turn text completion with no tools, for convenience callers
    /// like title generation or summarization.
    async fn complete_simple(&self, prompt: &str) -> LlmResult<String> {
        let messages = vec![Message::user(prompt)];
        let response = self.complete(&messages, &[], "").await?;
        Ok(response.message.text().unwrap_or_default().to_string())
    }

    /// Approximate the token count of a string. Each provider overrides
    /// this with whatever tokenizer it has available; the default is a
    /// coarse over-estimate so budgeting errs on the side of truncating
    /// too early rather than overflowing the model's context window.
    fn count_tokens(&self, text: &str) -> usize {
        text.len() / 4
    }

    /// The provider's maximum context window, in tokens.
    fn max_context_length(&self) -> usize;
}

#[async_trait]
impl LlmProvider for Box<dyn LlmProvider> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn model(&self) -> &str {
        (**self).model()
    }

    async fn stream(
        &self,
        messages: &[Message],
        tools: &[LlmToolDefinition],
        system: &str,
    ) -> LlmResult<StreamBox> {
        (**self).stream(messages, tools, system).await
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: &[LlmToolDefinition],
        system: &str,
    ) -> LlmResult<LlmResponse> {
        (**self).complete(messages, tools, system).await
    }

    fn count_tokens(&self, text: &str) -> usize {
        (**self).count_tokens(text)
    }

    fn max_context_length(&self) -> usize {
        (**self).max_context_length()
    }
}

/// Shared configuration for constructing a provider.
#[derive(Clone)]
pub struct ProviderConfig {
    /// The API key to authenticate with.
    pub api_key: String,
    /// The model identifier to request.
    pub model: String,
    /// The maximum number of tokens to generate.
    pub max_tokens: usize,
    /// Sampling temperature, clamped to `0.0..=1.0`.
    pub temperature: f64,
    /// Override the provider's default endpoint (for self-hosted/compatible
    /// deployments).
    pub base_url: Option<String>,
    /// Override the provider's default context window size.
    pub context_window: Option<usize>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("has_api_key", &!self.api_key.is_empty())
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("has_base_url", &self.base_url.is_some())
            .field("context_window", &self.context_window)
            .finish()
    }
}

impl ProviderConfig {
    /// Build a config from an API key and model name.
    #[must_use]
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            max_tokens: 4096,
            temperature: 0.7,
            base_url: None,
            context_window: None,
        }
    }

    /// Override the max-tokens cap.
    #[must_use]
    pub fn max_tokens(mut self, max: usize) -> Self {
        self.max_tokens = max;
        self
    }

    /// Override the sampling temperature, clamped to `0.0..=1.0`.
    #[must_use]
    pub fn temperature(mut self, temp: f64) -> Self {
        self.temperature = temp.clamp(0.0, 1.0);
        self
    }

    /// Override the endpoint base URL.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Override the context window size.
    #[must_use]
    pub fn context_window(mut self, size: usize) -> Self {
        self.context_window = Some(size);
        self
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 4096,
            temperature: 0.7,
            base_url: None,
            context_window: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temperature_clamps_to_unit_interval() {
        let config = ProviderConfig::new("key", "model").temperature(3.0);
        assert!((config.temperature - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = ProviderConfig::new("super-secret", "model");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret"));
    }
}
