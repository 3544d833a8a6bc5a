use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use tokio::sync::{OnceCell, Semaphore};

use crate::app::{FeedmailError, Result};
use crate::config::RetrieverConfig;

/// A rendered document as read back from the browser.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub content: String,
    pub title: String,
}

/// Narrow interface over the headless-browser capability.
///
/// Test doubles substitute a stub implementation; nothing outside this
/// module talks to the browser engine directly.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Load `url`, wait for navigation plus `settle`, and read the document.
    async fn render(&self, url: &str, settle: Duration) -> Result<RenderedPage>;
}

/// Chrome-based renderer using chromiumoxide.
pub struct ChromeRenderer {
    config: RetrieverConfig,
    browser: OnceCell<Arc<Browser>>,
    semaphore: Arc<Semaphore>,
}

impl ChromeRenderer {
    /// Cheap to construct; the browser launches lazily on first render so
    /// CLI paths that never touch the network don't start Chrome.
    pub fn new(config: RetrieverConfig) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrency));
        Self {
            config,
            browser: OnceCell::new(),
            semaphore,
        }
    }

    async fn browser(&self) -> Result<&Arc<Browser>> {
        self.browser
            .get_or_try_init(|| async {
                let mut builder = BrowserConfig::builder()
                    .arg("--no-sandbox")
                    .arg("--disable-gpu")
                    .arg("--disable-dev-shm-usage");

                if !self.config.headless {
                    builder = builder.with_head();
                }

                let browser_config = builder.build().map_err(|e| {
                    FeedmailError::Browser(format!("Failed to build browser config: {}", e))
                })?;

                let (browser, mut handler) =
                    Browser::launch(browser_config).await.map_err(|e| {
                        FeedmailError::Browser(format!(
                            "Failed to launch browser: {}. Is Chrome or Chromium installed and in PATH?",
                            e
                        ))
                    })?;

                tokio::spawn(async move {
                    while let Some(_event) = handler.next().await {
                        // Drain browser events
                    }
                });

                Ok(Arc::new(browser))
            })
            .await
    }
}

const READ_DOCUMENT_SCRIPT: &str = r#"
    (() => ({
        content: document.documentElement ? document.documentElement.outerHTML : '',
        title: document.title || ''
    }))()
"#;

#[async_trait]
impl Renderer for ChromeRenderer {
    async fn render(&self, url: &str, settle: Duration) -> Result<RenderedPage> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| FeedmailError::Browser(format!("Semaphore error: {}", e)))?;

        let browser = self.browser().await?;
        let page = browser
            .new_page(url)
            .await
            .map_err(|e| FeedmailError::Browser(format!("Failed to create page: {}", e)))?;

        let result = async {
            page.set_user_agent(&self.config.user_agent)
                .await
                .map_err(|e| FeedmailError::Browser(format!("Failed to set user agent: {}", e)))?;

            page.wait_for_navigation()
                .await
                .map_err(|e| FeedmailError::Browser(format!("Navigation failed: {}", e)))?;

            tokio::time::sleep(settle).await;

            let value: serde_json::Value = page
                .evaluate(READ_DOCUMENT_SCRIPT)
                .await
                .map_err(|e| FeedmailError::Browser(format!("Script execution failed: {}", e)))?
                .into_value()
                .map_err(|e| FeedmailError::Browser(format!("Failed to parse result: {:?}", e)))?;

            Ok(RenderedPage {
                content: value["content"].as_str().unwrap_or("").to_string(),
                title: value["title"].as_str().unwrap_or("").to_string(),
            })
        }
        .await;

        // Close the page on every exit path
        let _ = page.close().await;

        result
    }
}
