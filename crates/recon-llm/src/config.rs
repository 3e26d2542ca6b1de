// Configuration layer for provider-agnostic LLM client creation

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Type of LLM provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    Gemini,
    Groq,
}

impl Default for ProviderType {
    fn default() -> Self {
        ProviderType::Gemini
    }
}

/// Configuration for the Gemini provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    pub api_key: String,
    /// Candidate models probed in order at startup; empty means built-in defaults.
    #[serde(default)]
    pub model_candidates: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_payload_bytes: Option<usize>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Configuration for the Groq provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroqConfig {
    pub api_key: String,
    /// Empty means the built-in default model.
    #[serde(default)]
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_payload_bytes: Option<usize>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    60
}

/// Provider-specific configuration details
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderDetails {
    Gemini(GeminiConfig),
    Groq(GroqConfig),
}

/// Complete provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(flatten)]
    pub details: ProviderDetails,
}

impl ProviderConfig {
    pub fn gemini(api_key: impl Into<String>) -> Self {
        Self {
            details: ProviderDetails::Gemini(GeminiConfig {
                api_key: api_key.into(),
                model_candidates: Vec::new(),
                max_payload_bytes: None,
                timeout_secs: default_timeout_secs(),
            }),
        }
    }

    pub fn groq(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            details: ProviderDetails::Groq(GroqConfig {
                api_key: api_key.into(),
                model: model.into(),
                max_payload_bytes: None,
                timeout_secs: default_timeout_secs(),
            }),
        }
    }

    pub fn provider_type(&self) -> ProviderType {
        match self.details {
            ProviderDetails::Gemini(_) => ProviderType::Gemini,
            ProviderDetails::Groq(_) => ProviderType::Groq,
        }
    }

    pub fn with_max_payload_bytes(mut self, limit: usize) -> Self {
        match &mut self.details {
            ProviderDetails::Gemini(cfg) => cfg.max_payload_bytes = Some(limit),
            ProviderDetails::Groq(cfg) => cfg.max_payload_bytes = Some(limit),
        }
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        match &mut self.details {
            ProviderDetails::Gemini(cfg) => cfg.timeout_secs = secs,
            ProviderDetails::Groq(cfg) => cfg.timeout_secs = secs,
        }
        self
    }
}

/// Factory for creating LLM clients from configuration
pub struct ClientFactory;

impl ClientFactory {
    pub fn create_client(config: ProviderConfig) -> Result<Arc<dyn crate::traits::LlmClient>> {
        match config.details {
            ProviderDetails::Gemini(gemini_config) => {
                let client = crate::gemini::GeminiClient::new(gemini_config)?;
                Ok(Arc::new(client))
            }
            ProviderDetails::Groq(groq_config) => {
                let client = crate::groq::GroqClient::new(groq_config)?;
                Ok(Arc::new(client))
            }
        }
    }
}
