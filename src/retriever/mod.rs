//! Multi-strategy feed retrieval.
//!
//! The ordered fallback chain — direct fetch, header-spoofed fetch,
//! browser-rendered fetch, WordPress-API fallback — is a list of
//! [`RetrievalStrategy`] objects tried until one produces a parseable,
//! non-challenged feed. Feed discovery kicks in when the stored feed URL
//! itself is a dead end.

pub mod challenge;
pub mod discover;
pub mod render;
pub mod strategies;
pub mod wp;

use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use crate::config::RetrieverConfig;
use crate::domain::{NormalizedFeed, Subscription};
use crate::normalizer::Normalizer;

pub use challenge::ChallengeDetector;
pub use discover::FeedDiscoverer;
pub use render::{ChromeRenderer, RenderedPage, Renderer};
pub use strategies::{
    DirectFetch, RenderedFetch, RetrievalStrategy, SpoofedFetch, StrategyError, WpApiFallback,
};

/// Typed reasons retrieval failed for one subscription. None of these abort
/// a run; they flow up into the per-subscription report.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("No feed found")]
    NoFeedFound,

    #[error("All retrieval strategies exhausted")]
    AllStrategiesExhausted,

    #[error("Retrieval timed out")]
    Timeout,

    #[error("Blocked by an unresolved anti-bot challenge")]
    Blocked,
}

pub type RetrievalOutcome = std::result::Result<NormalizedFeed, RetrievalError>;

/// Seam the pipeline depends on; lets tests substitute a stub retriever.
#[async_trait]
pub trait Retrieve: Send + Sync {
    async fn retrieve(&self, sub: &Subscription) -> RetrievalOutcome;
}

/// Runs the strategy chain, composing with discovery when needed.
pub struct FeedRetriever {
    strategies: Vec<Box<dyn RetrievalStrategy>>,
    discoverer: FeedDiscoverer,
}

impl FeedRetriever {
    /// Build the production chain: direct → spoofed → rendered → WP API.
    pub fn new(
        client: reqwest::Client,
        renderer: Arc<dyn Renderer>,
        normalizer: Normalizer,
        config: RetrieverConfig,
    ) -> Self {
        let detector = ChallengeDetector::new();
        let strategies: Vec<Box<dyn RetrievalStrategy>> = vec![
            Box::new(DirectFetch::new(client.clone(), normalizer.clone())),
            Box::new(SpoofedFetch::new(client.clone(), normalizer.clone(), &config)),
            Box::new(RenderedFetch::new(
                renderer.clone(),
                detector,
                normalizer.clone(),
                config.clone(),
            )),
            Box::new(WpApiFallback::new(client.clone(), normalizer, &config)),
        ];
        let discoverer = FeedDiscoverer::new(client, renderer, config);

        Self {
            strategies,
            discoverer,
        }
    }

    /// Construct with an explicit chain; test seam.
    pub fn with_strategies(
        strategies: Vec<Box<dyn RetrievalStrategy>>,
        discoverer: FeedDiscoverer,
    ) -> Self {
        Self {
            strategies,
            discoverer,
        }
    }

    pub fn discoverer(&self) -> &FeedDiscoverer {
        &self.discoverer
    }

    /// Run the fallback chain against one feed URL, stopping at the first
    /// strategy that yields a feed.
    pub async fn retrieve_url(&self, feed_url: &str) -> RetrievalOutcome {
        let url = Url::parse(feed_url).map_err(|_| RetrievalError::NoFeedFound)?;

        let mut saw_challenge = false;
        let mut all_timed_out = !self.strategies.is_empty();

        for strategy in &self.strategies {
            match strategy.attempt(&url).await {
                Ok(feed) => {
                    tracing::debug!("Strategy {} succeeded for {}", strategy.name(), feed_url);
                    return Ok(feed);
                }
                Err(e) => {
                    tracing::debug!("Strategy {} failed for {}: {}", strategy.name(), feed_url, e);
                    match e {
                        StrategyError::Challenged => {
                            saw_challenge = true;
                            all_timed_out = false;
                        }
                        StrategyError::Timeout => {}
                        _ => all_timed_out = false,
                    }
                }
            }
        }

        if saw_challenge {
            Err(RetrievalError::Blocked)
        } else if all_timed_out {
            Err(RetrievalError::Timeout)
        } else {
            Err(RetrievalError::AllStrategiesExhausted)
        }
    }

    /// Retrieve for a subscription: try the stored feed URL, then fall back
    /// to discovering a feed from the subscription's site page.
    pub async fn retrieve_with_discovery(
        &self,
        feed_url: &str,
        site_url: &str,
    ) -> RetrievalOutcome {
        let first_error = match self.retrieve_url(feed_url).await {
            Ok(feed) => return Ok(feed),
            Err(e) => e,
        };

        tracing::info!(
            "Feed URL {} unusable ({}), attempting discovery from {}",
            feed_url,
            first_error,
            site_url
        );

        let discovered = match self.discoverer.discover(site_url).await {
            Ok(urls) => urls,
            Err(e) => {
                tracing::warn!("Discovery failed for {}: {}", site_url, e);
                Vec::new()
            }
        };

        if discovered.is_empty() {
            return Err(match first_error {
                RetrievalError::AllStrategiesExhausted | RetrievalError::NoFeedFound => {
                    RetrievalError::NoFeedFound
                }
                other => other,
            });
        }

        let mut last_error = first_error;
        for candidate in discovered {
            match self.retrieve_url(&candidate).await {
                Ok(feed) => return Ok(feed),
                Err(e) => last_error = e,
            }
        }

        Err(last_error)
    }
}

#[async_trait]
impl Retrieve for FeedRetriever {
    async fn retrieve(&self, sub: &Subscription) -> RetrievalOutcome {
        self.retrieve_with_discovery(&sub.feed_url, &sub.site_url)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Result as AppResult;
    use crate::domain::NormalizedItem;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records the chain order and fails or succeeds on command.
    struct ScriptedStrategy {
        name: &'static str,
        outcome: fn() -> std::result::Result<NormalizedFeed, StrategyError>,
        calls: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl RetrievalStrategy for ScriptedStrategy {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn attempt(&self, _url: &Url) -> std::result::Result<NormalizedFeed, StrategyError> {
            self.calls.lock().unwrap().push(self.name);
            (self.outcome)()
        }
    }

    struct NoopRenderer;

    #[async_trait]
    impl Renderer for NoopRenderer {
        async fn render(&self, _url: &str, _settle: Duration) -> AppResult<RenderedPage> {
            Ok(RenderedPage {
                content: String::new(),
                title: String::new(),
            })
        }
    }

    fn retriever_with(
        outcomes: Vec<(
            &'static str,
            fn() -> std::result::Result<NormalizedFeed, StrategyError>,
        )>,
        calls: Arc<Mutex<Vec<&'static str>>>,
    ) -> FeedRetriever {
        let strategies: Vec<Box<dyn RetrievalStrategy>> = outcomes
            .into_iter()
            .map(|(name, outcome)| {
                Box::new(ScriptedStrategy {
                    name,
                    outcome,
                    calls: calls.clone(),
                }) as Box<dyn RetrievalStrategy>
            })
            .collect();
        let discoverer = FeedDiscoverer::new(
            reqwest::Client::new(),
            Arc::new(NoopRenderer),
            RetrieverConfig::default(),
        );
        FeedRetriever::with_strategies(strategies, discoverer)
    }

    fn html_failure() -> std::result::Result<NormalizedFeed, StrategyError> {
        Err(StrategyError::NotAFeed("Received HTML instead of a feed".into()))
    }

    fn challenged() -> std::result::Result<NormalizedFeed, StrategyError> {
        Err(StrategyError::Challenged)
    }

    fn timed_out() -> std::result::Result<NormalizedFeed, StrategyError> {
        Err(StrategyError::Timeout)
    }

    fn one_item_feed() -> std::result::Result<NormalizedFeed, StrategyError> {
        Ok(NormalizedFeed {
            title: Some("Found".into()),
            items: vec![NormalizedItem {
                title: Some("Post".into()),
                link: Some("https://example.com/post".into()),
                ..Default::default()
            }],
        })
    }

    #[tokio::test]
    async fn test_chain_stops_at_first_success() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let retriever = retriever_with(
            vec![("direct", one_item_feed), ("spoofed", html_failure)],
            calls.clone(),
        );

        let feed = retriever
            .retrieve_url("https://example.com/feed.xml")
            .await
            .unwrap();
        assert_eq!(feed.title, Some("Found".into()));
        assert_eq!(*calls.lock().unwrap(), vec!["direct"]);
    }

    #[tokio::test]
    async fn test_html_responses_reach_rendered_strategy() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let retriever = retriever_with(
            vec![
                ("direct", html_failure),
                ("spoofed", html_failure),
                ("rendered", one_item_feed),
            ],
            calls.clone(),
        );

        retriever
            .retrieve_url("https://example.com/feed.xml")
            .await
            .unwrap();
        assert_eq!(*calls.lock().unwrap(), vec!["direct", "spoofed", "rendered"]);
    }

    #[tokio::test]
    async fn test_challenged_rendered_falls_through_to_wp_api() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let retriever = retriever_with(
            vec![
                ("direct", html_failure),
                ("spoofed", html_failure),
                ("rendered", challenged),
                ("wp-api", one_item_feed),
            ],
            calls.clone(),
        );

        retriever
            .retrieve_url("https://example.com/feed.xml")
            .await
            .unwrap();
        assert_eq!(
            *calls.lock().unwrap(),
            vec!["direct", "spoofed", "rendered", "wp-api"]
        );
    }

    #[tokio::test]
    async fn test_unresolved_challenge_folds_to_blocked() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let retriever = retriever_with(
            vec![
                ("direct", html_failure),
                ("rendered", challenged),
                ("wp-api", html_failure),
            ],
            calls,
        );

        let err = retriever
            .retrieve_url("https://example.com/feed.xml")
            .await
            .unwrap_err();
        assert!(matches!(err, RetrievalError::Blocked));
    }

    #[tokio::test]
    async fn test_all_timeouts_fold_to_timeout() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let retriever = retriever_with(
            vec![("direct", timed_out), ("spoofed", timed_out)],
            calls,
        );

        let err = retriever
            .retrieve_url("https://example.com/feed.xml")
            .await
            .unwrap_err();
        assert!(matches!(err, RetrievalError::Timeout));
    }

    #[tokio::test]
    async fn test_mixed_failures_fold_to_exhausted() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let retriever = retriever_with(
            vec![("direct", html_failure), ("spoofed", timed_out)],
            calls,
        );

        let err = retriever
            .retrieve_url("https://example.com/feed.xml")
            .await
            .unwrap_err();
        assert!(matches!(err, RetrievalError::AllStrategiesExhausted));
    }
}
