use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use url::Url;

use crate::config::RetrieverConfig;
use crate::domain::NormalizedFeed;
use crate::normalizer::{Normalizer, SourceKind};
use crate::retriever::challenge::ChallengeDetector;
use crate::retriever::render::Renderer;
use crate::retriever::wp;
use std::sync::Arc;

/// Why a single strategy gave up. Folded into a [`RetrievalError`] by the
/// chain once every strategy has been tried.
///
/// [`RetrievalError`]: crate::retriever::RetrievalError
#[derive(Debug, thiserror::Error)]
pub enum StrategyError {
    #[error("Response is not a feed: {0}")]
    NotAFeed(String),

    #[error("Anti-bot challenge not resolved")]
    Challenged,

    #[error("Request timed out")]
    Timeout,

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for StrategyError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            StrategyError::Timeout
        } else {
            StrategyError::Http(e.to_string())
        }
    }
}

/// One way of turning a feed URL into a normalized feed.
///
/// Strategies are tried in order by the retriever; each must be
/// independently mockable.
#[async_trait]
pub trait RetrievalStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn attempt(&self, feed_url: &Url) -> Result<NormalizedFeed, StrategyError>;
}

pub(crate) const FEED_ACCEPT: &str =
    "application/rss+xml, application/xml, text/xml, application/atom+xml, */*;q=0.1";

fn looks_like_html(body: &str) -> bool {
    let trimmed = body.trim_start();
    trimmed.starts_with("<html")
        || trimmed.starts_with("<HTML")
        || body.contains("<!DOCTYPE html")
        || body.contains("<!doctype html")
}

/// Slice out feed markup from a rendered document.
///
/// Chrome wraps raw XML in its viewer markup, so the feed tags sit inside an
/// HTML shell; the parser needs the bare `<rss>`/`<feed>` element.
pub(crate) fn extract_feed_markup(content: &str) -> Option<&str> {
    for (open, close) in [("<rss", "</rss>"), ("<feed", "</feed>")] {
        if let Some(start) = content.find(open) {
            if let Some(end) = content.rfind(close) {
                if end > start {
                    return Some(&content[start..end + close.len()]);
                }
            }
        }
    }
    None
}

/// Strategy 1: plain HTTP GET with default headers.
pub struct DirectFetch {
    client: reqwest::Client,
    normalizer: Normalizer,
}

impl DirectFetch {
    pub fn new(client: reqwest::Client, normalizer: Normalizer) -> Self {
        Self { client, normalizer }
    }
}

#[async_trait]
impl RetrievalStrategy for DirectFetch {
    fn name(&self) -> &'static str {
        "direct"
    }

    async fn attempt(&self, feed_url: &Url) -> Result<NormalizedFeed, StrategyError> {
        let response = self.client.get(feed_url.clone()).send().await?;
        let response = response.error_for_status().map_err(StrategyError::from)?;
        let body = response.bytes().await?;

        self.normalizer
            .normalize(&body, SourceKind::Feed)
            .map_err(|e| StrategyError::Parse(e.to_string()))
    }
}

/// Strategy 2: GET with a feed-favoring Accept header and a browser-like
/// user agent. An HTML response body fails the strategy outright; a feed
/// URL must not resolve to an HTML page.
pub struct SpoofedFetch {
    client: reqwest::Client,
    normalizer: Normalizer,
    user_agent: String,
}

impl SpoofedFetch {
    pub fn new(client: reqwest::Client, normalizer: Normalizer, config: &RetrieverConfig) -> Self {
        Self {
            client,
            normalizer,
            user_agent: config.user_agent.clone(),
        }
    }
}

#[async_trait]
impl RetrievalStrategy for SpoofedFetch {
    fn name(&self) -> &'static str {
        "spoofed"
    }

    async fn attempt(&self, feed_url: &Url) -> Result<NormalizedFeed, StrategyError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(FEED_ACCEPT));
        if let Ok(ua) = HeaderValue::from_str(&self.user_agent) {
            headers.insert(USER_AGENT, ua);
        }

        let response = self
            .client
            .get(feed_url.clone())
            .headers(headers)
            .send()
            .await?;
        let response = response.error_for_status().map_err(StrategyError::from)?;
        let body = response.text().await?;

        if looks_like_html(&body) {
            return Err(StrategyError::NotAFeed(
                "Received HTML instead of a feed".into(),
            ));
        }

        self.normalizer
            .normalize(body.as_bytes(), SourceKind::Feed)
            .map_err(|e| StrategyError::Parse(e.to_string()))
    }
}

/// Strategy 3: load the URL in the headless browser and read the rendered
/// document. On a challenge verdict, waits once more and re-reads before
/// giving up on the strategy.
pub struct RenderedFetch {
    renderer: Arc<dyn Renderer>,
    detector: ChallengeDetector,
    normalizer: Normalizer,
    config: RetrieverConfig,
}

impl RenderedFetch {
    pub fn new(
        renderer: Arc<dyn Renderer>,
        detector: ChallengeDetector,
        normalizer: Normalizer,
        config: RetrieverConfig,
    ) -> Self {
        Self {
            renderer,
            detector,
            normalizer,
            config,
        }
    }

    async fn render_once(
        &self,
        feed_url: &Url,
        settle: std::time::Duration,
    ) -> Result<crate::retriever::render::RenderedPage, StrategyError> {
        tokio::time::timeout(
            self.config.render_timeout(),
            self.renderer.render(feed_url.as_str(), settle),
        )
        .await
        .map_err(|_| StrategyError::Timeout)?
        .map_err(|e| StrategyError::Http(e.to_string()))
    }
}

#[async_trait]
impl RetrievalStrategy for RenderedFetch {
    fn name(&self) -> &'static str {
        "rendered"
    }

    async fn attempt(&self, feed_url: &Url) -> Result<NormalizedFeed, StrategyError> {
        let mut page = self.render_once(feed_url, self.config.settle()).await?;

        if self.detector.looks_challenged(&page.content, &page.title) {
            tracing::debug!("Challenge detected on {}, waiting for it to clear", feed_url);
            page = self
                .render_once(feed_url, self.config.challenge_wait())
                .await?;

            if self.detector.looks_challenged(&page.content, &page.title) {
                return Err(StrategyError::Challenged);
            }
        }

        let markup = extract_feed_markup(&page.content).ok_or_else(|| {
            StrategyError::NotAFeed("Rendered document contains no feed markup".into())
        })?;

        self.normalizer
            .normalize(markup.as_bytes(), SourceKind::Feed)
            .map_err(|e| StrategyError::Parse(e.to_string()))
    }
}

/// Strategy 4: probe the conventional WordPress posts endpoint at the same
/// origin and synthesize a feed from post-shaped JSON records.
pub struct WpApiFallback {
    client: reqwest::Client,
    normalizer: Normalizer,
    user_agent: String,
}

impl WpApiFallback {
    pub fn new(client: reqwest::Client, normalizer: Normalizer, config: &RetrieverConfig) -> Self {
        Self {
            client,
            normalizer,
            user_agent: config.user_agent.clone(),
        }
    }
}

#[async_trait]
impl RetrievalStrategy for WpApiFallback {
    fn name(&self) -> &'static str {
        "wp-api"
    }

    async fn attempt(&self, feed_url: &Url) -> Result<NormalizedFeed, StrategyError> {
        let endpoint =
            wp::wp_posts_url(feed_url).map_err(|e| StrategyError::Http(e.to_string()))?;

        let response = self
            .client
            .get(endpoint)
            .header(USER_AGENT, self.user_agent.as_str())
            .send()
            .await?;
        let response = response.error_for_status().map_err(StrategyError::from)?;
        let body = response.bytes().await?;

        self.normalizer
            .normalize(&body, SourceKind::WpJson)
            .map_err(|e| StrategyError::NotAFeed(e.to_string()))
    }
}
