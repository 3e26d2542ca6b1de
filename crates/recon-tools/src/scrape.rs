//! Headless-browser page scraping
//!
//! Renders the target in Chrome via the DevTools protocol, extracts the
//! visible text, and hands the content to a background ingestion task so
//! the mission can keep moving while memory catches up.

use crate::error::{Result, ToolError};
use crate::validate::validate_url;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use recon_memory::MemoryIngestor;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    /// Hard deadline for the whole scrape, navigation included.
    pub total_timeout: Duration,
    /// How long to wait for DOM-content readiness before dropping to the
    /// commit tier.
    pub nav_timeout: Duration,
    /// Fallback window for the earlier commit state (a document exists at
    /// all) when full readiness never arrives.
    pub commit_timeout: Duration,
    /// Settle pause for late-running scripts after readiness.
    pub settle: Duration,
    pub user_agent: String,
    /// Disable for Docker/CI environments.
    pub sandbox: bool,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            total_timeout: Duration::from_secs(60),
            nav_timeout: Duration::from_secs(20),
            commit_timeout: Duration::from_secs(5),
            settle: Duration::from_millis(500),
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36"
                .to_string(),
            sandbox: true,
        }
    }
}

#[async_trait]
pub trait PageScraper: Send + Sync {
    /// Fetch the visible text of a page. The URL must pass the SSRF
    /// predicate first.
    async fn scrape(&self, url: &str, conversation_id: i64) -> Result<String>;
}

pub struct BrowserScraper {
    config: ScrapeConfig,
    browser: Arc<Mutex<Option<Browser>>>,
    handler_handle: Arc<Mutex<Option<tokio::task::JoinHandle<()>>>>,
    ingestor: Option<Arc<MemoryIngestor>>,
}

impl BrowserScraper {
    pub fn new(config: ScrapeConfig) -> Self {
        Self {
            config,
            browser: Arc::new(Mutex::new(None)),
            handler_handle: Arc::new(Mutex::new(None)),
            ingestor: None,
        }
    }

    /// Attach a memory ingestor; scraped content is then mirrored into the
    /// vector store in the background.
    pub fn with_ingestor(mut self, ingestor: Arc<MemoryIngestor>) -> Self {
        self.ingestor = Some(ingestor);
        self
    }

    /// Launch the browser lazily on first use.
    async fn ensure_browser(&self) -> Result<()> {
        let mut browser_guard = self.browser.lock().await;
        if browser_guard.is_some() {
            return Ok(());
        }

        info!("launching headless browser");

        let mut builder = BrowserConfig::builder();

        if !self.config.sandbox {
            builder = builder.no_sandbox();
        }

        builder = builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg(format!("--user-agent={}", self.config.user_agent))
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-zygote")
            .arg("--disable-extensions");

        let browser_config = builder
            .build()
            .map_err(|e| ToolError::ScrapeFailed(format!("browser config: {}", e)))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| ToolError::ScrapeFailed(format!("browser launch: {}", e)))?;

        let handle = tokio::spawn(async move {
            while let Some(result) = handler.next().await {
                if result.is_err() {
                    break;
                }
            }
        });

        *browser_guard = Some(browser);
        *self.handler_handle.lock().await = Some(handle);

        info!("headless browser ready");
        Ok(())
    }

    async fn fetch_text(&self, url: &str) -> Result<String> {
        self.ensure_browser().await?;

        let browser_guard = self.browser.lock().await;
        let browser = browser_guard
            .as_ref()
            .ok_or_else(|| ToolError::ScrapeFailed("browser not initialized".to_string()))?;

        let page = browser
            .new_page(url)
            .await
            .map_err(|e| ToolError::ScrapeFailed(format!("failed to open page: {}", e)))?;

        // Two-tier readiness: prefer DOM-content loaded; when that never
        // arrives, drop to a shorter wait for the commit state so a slow
        // page still yields whatever document exists.
        match timeout(self.config.nav_timeout, page.wait_for_navigation()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                warn!(%url, error = %e, "navigation reported an error, waiting for a committed document");
                if !wait_for_commit(&page, self.config.commit_timeout).await {
                    warn!(%url, "no document committed within the fallback window");
                }
            }
            Err(_) => {
                warn!(%url, "navigation readiness timed out, waiting for a committed document");
                if !wait_for_commit(&page, self.config.commit_timeout).await {
                    warn!(%url, "no document committed within the fallback window");
                }
            }
        }

        if !self.config.settle.is_zero() {
            tokio::time::sleep(self.config.settle).await;
        }

        let text = page
            .evaluate("document.body ? document.body.innerText : ''")
            .await
            .map_err(|e| ToolError::ScrapeFailed(format!("text extraction: {}", e)))?
            .into_value::<String>()
            .map_err(|e| ToolError::ScrapeFailed(format!("text decoding: {}", e)))?;

        if let Err(e) = page.close().await {
            warn!(%url, error = %e, "failed to close page");
        }

        if text.trim().is_empty() {
            return Err(ToolError::ScrapeFailed(format!(
                "no visible text extracted from {}",
                url
            )));
        }

        Ok(text)
    }

    pub async fn close(&self) -> Result<()> {
        let mut browser_guard = self.browser.lock().await;
        if let Some(mut browser) = browser_guard.take() {
            browser
                .close()
                .await
                .map_err(|e| ToolError::ScrapeFailed(format!("browser close: {}", e)))?;
        }
        if let Some(handle) = self.handler_handle.lock().await.take() {
            handle.abort();
        }
        Ok(())
    }
}

/// Commit-tier readiness: poll until the page answers for its document at
/// all (any `document.readyState` value means a navigation has committed),
/// bounded by `window`. Returns false when nothing committed in time.
async fn wait_for_commit(page: &Page, window: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + window;
    loop {
        if let Ok(result) = page.evaluate("document.readyState").await {
            if let Ok(state) = result.into_value::<String>() {
                if !state.is_empty() {
                    return true;
                }
            }
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
}

#[async_trait]
impl PageScraper for BrowserScraper {
    async fn scrape(&self, url: &str, conversation_id: i64) -> Result<String> {
        let validated = validate_url(url).await?;
        let url = validated.as_str().to_string();

        debug!(%url, conversation_id, "scraping page");

        let text = timeout(self.config.total_timeout, self.fetch_text(&url))
            .await
            .map_err(|_| {
                ToolError::ScrapeFailed(format!(
                    "scrape of {} exceeded {}s deadline",
                    url,
                    self.config.total_timeout.as_secs()
                ))
            })??;

        // Mirror into memory without blocking the mission.
        if let Some(ingestor) = &self.ingestor {
            let ingestor = Arc::clone(ingestor);
            let title = url.clone();
            let content = text.clone();
            tokio::spawn(async move {
                if let Err(e) = ingestor.ingest(&title, &content, conversation_id).await {
                    warn!(%title, error = %e, "background ingestion of scraped page failed");
                }
            });
        }

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_layered_timeouts() {
        let config = ScrapeConfig::default();
        assert_eq!(config.total_timeout, Duration::from_secs(60));
        assert!(config.nav_timeout < config.total_timeout);
        assert!(config.commit_timeout < config.nav_timeout);
        assert!(config.sandbox);
    }

    #[tokio::test]
    async fn unsafe_urls_are_rejected_before_any_browser_work() {
        let scraper = BrowserScraper::new(ScrapeConfig::default());

        let result = scraper.scrape("file:///etc/passwd", 1).await;
        assert!(matches!(result, Err(ToolError::UnsafeUrl(_))));

        let result = scraper.scrape("http://127.0.0.1/secret", 1).await;
        assert!(matches!(result, Err(ToolError::UnsafeUrl(_))));

        // No browser was launched for rejected URLs.
        assert!(scraper.browser.lock().await.is_none());
    }
}
