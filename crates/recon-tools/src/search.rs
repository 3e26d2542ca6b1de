//! Keyword web search via the DuckDuckGo instant-answer API (no API key).

use crate::error::{Result, ToolError};
use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;

const SEARCH_API_URL: &str = "https://api.duckduckgo.com/";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_RESULTS_PER_QUERY: usize = 5;

/// Query rephrasings issued for a price-oriented search, in order.
const PRICE_QUERY_TEMPLATES: [&str; 6] = [
    "{product} price {year}",
    "{product} cost {year}",
    "{product} pricing {year}",
    "{product} MSRP {year}",
    "{product} retail price {year}",
    "where to buy {product}",
];

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Keyword search, formatted one entry per result.
    async fn search(&self, query: &str) -> Result<String>;

    /// Price-oriented search: several query rephrasings, deduplicated by
    /// source URL, ordered by rephrasing ordinal then native order.
    async fn search_prices(&self, product: &str, year: i32) -> Result<String>;
}

pub struct DuckDuckGoClient {
    client: reqwest::Client,
}

impl DuckDuckGoClient {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("recon/0.1 (research agent)")
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }

    async fn fetch_hits(&self, query: &str) -> Result<Vec<SearchHit>> {
        let response = self
            .client
            .get(SEARCH_API_URL)
            .query(&[("q", query), ("format", "json"), ("no_html", "1")])
            .send()
            .await
            .map_err(|e| ToolError::SearchFailed(format!("request failed: {}", e)))?;

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ToolError::SearchFailed(format!("unparseable response: {}", e)))?;

        let mut hits = Vec::new();

        // Abstract (main result)
        if let Some(abstract_text) = data.get("AbstractText").and_then(|t| t.as_str()) {
            if !abstract_text.is_empty() {
                hits.push(SearchHit {
                    title: data
                        .get("Heading")
                        .and_then(|h| h.as_str())
                        .unwrap_or("Result")
                        .to_string(),
                    url: data
                        .get("AbstractURL")
                        .and_then(|u| u.as_str())
                        .unwrap_or("")
                        .to_string(),
                    snippet: abstract_text.to_string(),
                });
            }
        }

        // Related topics
        if let Some(topics) = data.get("RelatedTopics").and_then(|r| r.as_array()) {
            for topic in topics {
                if hits.len() >= MAX_RESULTS_PER_QUERY {
                    break;
                }
                if let Some(text) = topic.get("Text").and_then(|t| t.as_str()) {
                    hits.push(SearchHit {
                        title: text.chars().take(80).collect::<String>(),
                        url: topic
                            .get("FirstURL")
                            .and_then(|u| u.as_str())
                            .unwrap_or("")
                            .to_string(),
                        snippet: text.to_string(),
                    });
                }
            }
        }

        Ok(hits)
    }
}

impl Default for DuckDuckGoClient {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

#[async_trait]
impl SearchClient for DuckDuckGoClient {
    async fn search(&self, query: &str) -> Result<String> {
        let hits = self.fetch_hits(query).await?;
        Ok(format_hits(&hits))
    }

    async fn search_prices(&self, product: &str, year: i32) -> Result<String> {
        let queries = price_queries(product, year);

        let mut batches = Vec::with_capacity(queries.len());
        let mut failures = 0usize;
        for query in &queries {
            match self.fetch_hits(query).await {
                Ok(hits) => batches.push(hits),
                Err(e) => {
                    warn!(%query, error = %e, "price search rephrasing failed");
                    failures += 1;
                    batches.push(Vec::new());
                }
            }
        }

        if failures == queries.len() {
            return Err(ToolError::SearchFailed(
                "all price query rephrasings failed".to_string(),
            ));
        }

        let merged = merge_hits(batches);
        Ok(format_hits(&merged))
    }
}

/// Build the six price rephrasings for a product.
pub fn price_queries(product: &str, year: i32) -> Vec<String> {
    PRICE_QUERY_TEMPLATES
        .iter()
        .map(|template| {
            template
                .replace("{product}", product)
                .replace("{year}", &year.to_string())
        })
        .collect()
}

/// Merge per-query batches, deduplicating by source URL (falling back to
/// the title when the backend gives no URL). Order is batch ordinal then
/// native order.
pub fn merge_hits(batches: Vec<Vec<SearchHit>>) -> Vec<SearchHit> {
    let mut seen = std::collections::HashSet::new();
    let mut merged = Vec::new();
    for batch in batches {
        for hit in batch {
            let key = if hit.url.is_empty() {
                format!("title:{}", hit.title)
            } else {
                hit.url.clone()
            };
            if seen.insert(key) {
                merged.push(hit);
            }
        }
    }
    merged
}

pub fn format_hits(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "No results found.".to_string();
    }
    hits.iter()
        .map(|hit| format!("{}\n{}\nSource: {}", hit.title, hit.snippet, hit.url))
        .collect::<Vec<_>>()
        .join("\n\n")
}
