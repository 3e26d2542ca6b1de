//! Outbound side-effect actions: external notebook archive and email relay.
//!
//! Page formatting and mail delivery are external collaborators; this
//! dispatcher only posts minimal payloads to their HTTP contracts and
//! reports the outcome.

use crate::error::{Result, ToolError};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tracing::info;

const NOTION_API_URL: &str = "https://api.notion.com/v1/pages";
const NOTION_API_VERSION: &str = "2022-06-28";

/// Notion paragraph blocks cap out at 2000 chars.
const NOTION_BLOCK_CHARS: usize = 1900;
const NOTION_MAX_BLOCKS: usize = 100;

#[derive(Debug, Clone, Default)]
pub struct ActionConfig {
    pub notion_token: Option<String>,
    pub notion_parent_page_id: Option<String>,
    /// HTTP relay that accepts `{to, subject, body}`.
    pub email_endpoint: Option<String>,
    /// Default recipient when the plan does not name one.
    pub email_to: Option<String>,
}

#[async_trait]
pub trait ActionDispatcher: Send + Sync {
    async fn save_to_notebook(&self, title: &str, content: &str) -> Result<String>;

    async fn dispatch_email(&self, to: &str, subject: &str, body: &str) -> Result<String>;

    fn default_email_to(&self) -> Option<String> {
        None
    }
}

pub struct HttpActionDispatcher {
    client: reqwest::Client,
    config: ActionConfig,
}

impl HttpActionDispatcher {
    pub fn new(config: ActionConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, config }
    }
}

/// Split report content into paragraph blocks the notebook API accepts.
pub fn paragraph_blocks(content: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current = String::new();

    for ch in content.chars() {
        current.push(ch);
        if current.chars().count() >= NOTION_BLOCK_CHARS {
            blocks.push(std::mem::take(&mut current));
            if blocks.len() >= NOTION_MAX_BLOCKS {
                return blocks;
            }
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }
    blocks
}

#[async_trait]
impl ActionDispatcher for HttpActionDispatcher {
    async fn save_to_notebook(&self, title: &str, content: &str) -> Result<String> {
        let token = self.config.notion_token.as_deref().ok_or_else(|| {
            ToolError::ActionFailed("notebook integration is not configured".to_string())
        })?;
        let parent = self.config.notion_parent_page_id.as_deref().ok_or_else(|| {
            ToolError::ActionFailed("notebook parent page is not configured".to_string())
        })?;

        let children: Vec<serde_json::Value> = paragraph_blocks(content)
            .into_iter()
            .map(|block| {
                json!({
                    "object": "block",
                    "type": "paragraph",
                    "paragraph": {
                        "rich_text": [{ "type": "text", "text": { "content": block } }]
                    }
                })
            })
            .collect();

        let body = json!({
            "parent": { "page_id": parent },
            "properties": {
                "title": {
                    "title": [{ "type": "text", "text": { "content": title } }]
                }
            },
            "children": children,
        });

        let response = self
            .client
            .post(NOTION_API_URL)
            .bearer_auth(token)
            .header("Notion-Version", NOTION_API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| ToolError::ActionFailed(format!("notebook request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ToolError::ActionFailed(format!(
                "notebook archive rejected ({}): {}",
                status, detail
            )));
        }

        info!(%title, "report archived to notebook");
        Ok(format!("Archived \"{}\" to notebook", title))
    }

    async fn dispatch_email(&self, to: &str, subject: &str, body: &str) -> Result<String> {
        let endpoint = self.config.email_endpoint.as_deref().ok_or_else(|| {
            ToolError::ActionFailed("email relay is not configured".to_string())
        })?;

        let response = self
            .client
            .post(endpoint)
            .json(&json!({ "to": to, "subject": subject, "body": body }))
            .send()
            .await
            .map_err(|e| ToolError::ActionFailed(format!("email relay request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ToolError::ActionFailed(format!(
                "email relay rejected ({}): {}",
                status, detail
            )));
        }

        info!(%to, %subject, "report emailed");
        Ok(format!("Email dispatched to {}", to))
    }

    fn default_email_to(&self) -> Option<String> {
        self.config.email_to.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_notebook_fails_cleanly() {
        let dispatcher = HttpActionDispatcher::new(ActionConfig::default());
        let result = dispatcher.save_to_notebook("Title", "content").await;
        assert!(matches!(result, Err(ToolError::ActionFailed(_))));
    }

    #[tokio::test]
    async fn unconfigured_email_fails_cleanly() {
        let dispatcher = HttpActionDispatcher::new(ActionConfig::default());
        let result = dispatcher.dispatch_email("a@b.example", "s", "b").await;
        assert!(matches!(result, Err(ToolError::ActionFailed(_))));
    }

    #[test]
    fn long_content_is_split_into_bounded_blocks() {
        let content = "x".repeat(5000);
        let blocks = paragraph_blocks(&content);
        assert_eq!(blocks.len(), 3);
        assert!(blocks.iter().all(|b| b.chars().count() <= NOTION_BLOCK_CHARS));
        assert_eq!(blocks.iter().map(|b| b.len()).sum::<usize>(), 5000);
    }

    #[test]
    fn block_count_is_capped() {
        let content = "y".repeat(NOTION_BLOCK_CHARS * (NOTION_MAX_BLOCKS + 10));
        let blocks = paragraph_blocks(&content);
        assert_eq!(blocks.len(), NOTION_MAX_BLOCKS);
    }
}
