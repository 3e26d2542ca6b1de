use crate::error::Result;
use async_trait::async_trait;

/// Trait for text-completion LLM providers.
///
/// Callers hand over a fully-formed prompt; the client owns payload-size
/// guarding, quota retries and transport retries.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Non-streaming completion for a single prompt.
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String>;

    /// Hard ceiling on the serialized request body for this provider.
    fn max_payload_bytes(&self) -> usize;

    /// Provider name for logging and health reporting.
    fn provider(&self) -> &str;
}

#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
}

impl GenerateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn max_output_tokens(mut self, tokens: u32) -> Self {
        self.max_output_tokens = Some(tokens);
        self
    }
}
