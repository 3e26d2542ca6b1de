// Gemini client (HTTP direct, no SDK)

use crate::config::GeminiConfig;
use crate::error::{LlmError, Result};
use crate::retry::{AttemptError, RetryPolicy};
use crate::traits::{GenerateOptions, LlmClient};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::OnceCell;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Free-tier model availability shifts, so the working model is discovered
/// at first use: each candidate is probed in order and the first one that
/// answers is cached for the process lifetime.
const DEFAULT_MODEL_CANDIDATES: &[&str] = &[
    "gemini-2.0-flash",
    "gemini-1.5-flash",
    "gemini-1.5-flash-8b",
];

/// Minimum pause between model probes so discovery itself cannot trip the
/// free-tier rate limit.
const PROBE_COOLDOWN: Duration = Duration::from_secs(5);

const DEFAULT_MAX_PAYLOAD_BYTES: usize = 512 * 1024;

pub struct GeminiClient {
    http_client: reqwest::Client,
    api_key: String,
    base_url: String,
    candidates: Vec<String>,
    resolved_model: OnceCell<String>,
    max_payload_bytes: usize,
    retry: RetryPolicy,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(LlmError::Config("gemini api key is empty".to_string()));
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Config(format!("failed to build http client: {}", e)))?;

        let candidates = if config.model_candidates.is_empty() {
            DEFAULT_MODEL_CANDIDATES.iter().map(|s| s.to_string()).collect()
        } else {
            config.model_candidates
        };

        Ok(Self {
            http_client,
            api_key: config.api_key,
            base_url: GEMINI_API_BASE.to_string(),
            candidates,
            resolved_model: OnceCell::new(),
            max_payload_bytes: config.max_payload_bytes.unwrap_or(DEFAULT_MAX_PAYLOAD_BYTES),
            retry: RetryPolicy::default(),
        })
    }

    /// Probe candidates in order and cache the first model that answers.
    async fn resolve_model(&self) -> Result<&str> {
        let model = self
            .resolved_model
            .get_or_try_init(|| async {
                let mut last_error = String::new();
                for (idx, candidate) in self.candidates.iter().enumerate() {
                    if idx > 0 {
                        tokio::time::sleep(PROBE_COOLDOWN).await;
                    }
                    match self.probe(candidate).await {
                        Ok(()) => {
                            tracing::info!(model = %candidate, "gemini model discovered");
                            return Ok(candidate.clone());
                        }
                        Err(reason) => {
                            tracing::warn!(model = %candidate, %reason, "gemini model probe failed");
                            last_error = reason;
                        }
                    }
                }
                Err(LlmError::ModelDiscovery(format!(
                    "no candidate model answered, last error: {}",
                    last_error
                )))
            })
            .await?;
        Ok(model.as_str())
    }

    async fn probe(&self, model: &str) -> std::result::Result<(), String> {
        let body = json!({
            "contents": [{ "parts": [{ "text": "ping" }] }],
            "generationConfig": { "maxOutputTokens": 1 }
        });

        let response = self
            .http_client
            .post(self.endpoint(model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(format!("status {}", response.status()))
        }
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }

    fn build_request(&self, prompt: &str, options: &GenerateOptions) -> Value {
        let mut generation_config = serde_json::Map::new();
        if let Some(temp) = options.temperature {
            generation_config.insert("temperature".to_string(), json!(temp));
        }
        if let Some(max_tokens) = options.max_output_tokens {
            generation_config.insert("maxOutputTokens".to_string(), json!(max_tokens));
        }

        let mut request = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
        });
        if !generation_config.is_empty() {
            request
                .as_object_mut()
                .expect("request is an object")
                .insert("generationConfig".to_string(), Value::Object(generation_config));
        }
        request
    }

    async fn send_once(
        &self,
        model: &str,
        payload: &Value,
    ) -> std::result::Result<String, AttemptError> {
        let response = self
            .http_client
            .post(self.endpoint(model))
            .header("x-goog-api-key", &self.api_key)
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
                "gemini error ({}): {}",
                status, body
            ))));
        }

        let raw: GeminiResponse = response.json().await.map_err(|e| {
            AttemptError::Fatal(LlmError::InvalidResponse(format!(
                "failed to parse gemini response: {}",
                e
            )))
        })?;

        raw.text().ok_or_else(|| {
            AttemptError::Fatal(LlmError::InvalidResponse(
                "gemini response contained no text parts".to_string(),
            ))
        })
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String> {
        let model = self.resolve_model().await?;
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

        self.retry.run(|| self.send_once(model, &payload)).await
    }

    fn max_payload_bytes(&self) -> usize {
        self.max_payload_bytes
    }

    fn provider(&self) -> &str {
        "gemini"
    }
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

impl GeminiResponse {
    fn text(&self) -> Option<String> {
        let joined: String = self
            .candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        if joined.is_empty() {
            None
        } else {
            Some(joined)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeminiConfig;

    fn test_client(max_payload: Option<usize>) -> GeminiClient {
        GeminiClient::new(GeminiConfig {
            api_key: "test-key".to_string(),
            model_candidates: vec!["gemini-2.0-flash".to_string()],
            max_payload_bytes: max_payload,
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[test]
    fn empty_api_key_is_rejected() {
        let result = GeminiClient::new(GeminiConfig {
            api_key: String::new(),
            model_candidates: vec![],
            max_payload_bytes: None,
            timeout_secs: 5,
        });
        assert!(matches!(result, Err(LlmError::Config(_))));
    }

    #[test]
    fn response_text_joins_parts() {
        let raw: GeminiResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{
                "content": { "parts": [{ "text": "Hello " }, { "text": "world" }] }
            }]
        }))
        .unwrap();
        assert_eq!(raw.text().unwrap(), "Hello world");
    }

    #[test]
    fn empty_candidates_yield_no_text() {
        let raw: GeminiResponse = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(raw.text().is_none());
    }

    #[test]
    fn request_includes_generation_config_only_when_set() {
        let client = test_client(None);
        let bare = client.build_request("hi", &GenerateOptions::default());
        assert!(bare.get("generationConfig").is_none());

        let tuned = client.build_request("hi", &GenerateOptions::new().temperature(0.2));
        assert!(tuned.get("generationConfig").is_some());
    }

    #[tokio::test]
    async fn oversized_prompt_fails_before_any_request() {
        let client = test_client(Some(64));
        // Model is pre-resolved so no probe traffic happens.
        client
            .resolved_model
            .set("gemini-2.0-flash".to_string())
            .unwrap();

        let prompt = "x".repeat(1024);
        let result = client.generate(&prompt, &GenerateOptions::default()).await;
        assert!(matches!(result, Err(LlmError::PayloadTooLarge { .. })));
    }
}
