// Groq client (OpenAI-compatible chat completions, HTTP direct)

use crate::config::GroqConfig;
use crate::error::{LlmError, Result};
use crate::retry::{AttemptError, RetryPolicy};
use crate::traits::{GenerateOptions, LlmClient};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";

const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

/// Groq rejects large request bodies well below typical context sizes, so
/// the ceiling stays conservative unless configuration overrides it.
const DEFAULT_MAX_PAYLOAD_BYTES: usize = 28 * 1024;

pub struct GroqClient {
    http_client: reqwest::Client,
    base_url: String,
    model: String,
    max_payload_bytes: usize,
    retry: RetryPolicy,
}

impl GroqClient {
    pub fn new(config: GroqConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(LlmError::Config("groq api key is empty".to_string()));
        }

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::AUTHORIZATION,
            reqwest::header::HeaderValue::from_str(&format!("Bearer {}", config.api_key))
                .map_err(|_| LlmError::Config("invalid groq api key format".to_string()))?,
        );

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Config(format!("failed to build http client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: GROQ_API_BASE.to_string(),
            model: if config.model.is_empty() {
                DEFAULT_MODEL.to_string()
            } else {
                config.model
            },
            max_payload_bytes: config.max_payload_bytes.unwrap_or(DEFAULT_MAX_PAYLOAD_BYTES),
            retry: RetryPolicy::default(),
        })
    }

    fn build_request(&self, prompt: &str, options: &GenerateOptions) -> Value {
        let mut request = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
        });
        let obj = request.as_object_mut().expect("request is an object");
        if let Some(temp) = options.temperature {
            obj.insert("temperature".to_string(), json!(temp));
        }
        if let Some(max_tokens) = options.max_output_tokens {
            obj.insert("max_tokens".to_string(), json!(max_tokens));
        }
        request
    }

    async fn send_once(&self, payload: &Value) -> std::result::Result<String, AttemptError> {
        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    AttemptError::Transport(e.to_string())
                } else {
                    AttemptError::Fatal(LlmError::UpstreamUnavailable(e.to_string()))
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(AttemptError::RateLimited);
        }
        if status.is_server_error() {
            return Err(AttemptError::Transport(format!("status {}", status)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AttemptError::Fatal(LlmError::InvalidResponse(format!(
                "groq error ({}): {}",
                status, body
            ))));
        }

        let raw: ChatCompletionResponse = response.json().await.map_err(|e| {
            AttemptError::Fatal(LlmError::InvalidResponse(format!(
                "failed to parse groq response: {}",
                e
            )))
        })?;

        raw.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.is_empty())
            .ok_or_else(|| {
                AttemptError::Fatal(LlmError::InvalidResponse(
                    "groq response contained no message content".to_string(),
                ))
            })
    }
}

#[async_trait]
impl LlmClient for GroqClient {
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String> {
        let payload = self.build_request(prompt, options);

        let size = serde_json::to_vec(&payload)
            .map_err(|e| LlmError::InvalidResponse(format!("failed to serialize request: {}", e)))?
            .len();
        if size > self.max_payload_bytes {
            return Err(LlmError::PayloadTooLarge {
                size,
                limit: self.max_payload_bytes,
            });
        }

        self.retry.run(|| self.send_once(&payload)).await
    }

    fn max_payload_bytes(&self) -> usize {
        self.max_payload_bytes
    }

    fn provider(&self) -> &str {
        "groq"
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GroqConfig;

    fn test_client(max_payload: Option<usize>) -> GroqClient {
        GroqClient::new(GroqConfig {
            api_key: "test-key".to_string(),
            model: String::new(),
            max_payload_bytes: max_payload,
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[test]
    fn default_model_fills_in() {
        let client = test_client(None);
        assert_eq!(client.model, DEFAULT_MODEL);
        assert_eq!(client.max_payload_bytes(), DEFAULT_MAX_PAYLOAD_BYTES);
    }

    #[tokio::test]
    async fn oversized_prompt_fails_before_any_request() {
        let client = test_client(Some(256));
        let prompt = "x".repeat(2048);
        let result = client.generate(&prompt, &GenerateOptions::default()).await;
        assert!(matches!(
            result,
            Err(LlmError::PayloadTooLarge { limit: 256, .. })
        ));
    }

    #[test]
    fn response_parsing_takes_first_choice() {
        let raw: ChatCompletionResponse = serde_json::from_value(serde_json::json!({
            "choices": [
                { "message": { "role": "assistant", "content": "first" } },
                { "message": { "role": "assistant", "content": "second" } }
            ]
        }))
        .unwrap();
        let content = raw.choices.into_iter().next().unwrap().message.content;
        assert_eq!(content.unwrap(), "first");
    }
}
