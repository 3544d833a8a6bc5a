use std::sync::Arc;
use std::sync::OnceLock;

use regex::Regex;
use url::Url;

use crate::app::Result;
use crate::config::RetrieverConfig;
use crate::retriever::render::Renderer;

/// Conventional feed locations probed when a page declares none.
pub const COMMON_FEED_PATHS: &[&str] = &[
    "/feed",
    "/rss",
    "/feed.xml",
    "/rss.xml",
    "/atom.xml",
    "/feed/atom",
    "/feed/rss",
    "/rss/atom",
    "/index.xml",
];

/// Locates feed URLs for a site page.
///
/// Three layers, cheapest first: scan the page HTML for feed `<link>`
/// declarations, probe the conventional paths, then render the page in the
/// browser and scan the rendered document.
pub struct FeedDiscoverer {
    client: reqwest::Client,
    renderer: Arc<dyn Renderer>,
    config: RetrieverConfig,
}

impl FeedDiscoverer {
    pub fn new(client: reqwest::Client, renderer: Arc<dyn Renderer>, config: RetrieverConfig) -> Self {
        Self {
            client,
            renderer,
            config,
        }
    }

    /// Discover feed URLs for `site_url`, most likely first.
    pub async fn discover(&self, site_url: &str) -> Result<Vec<String>> {
        let base = Url::parse(site_url)?;

        match self.client.get(base.clone()).send().await {
            Ok(response) if response.status().is_success() => {
                if let Ok(html) = response.text().await {
                    let found = scan_feed_links(&html, &base);
                    if !found.is_empty() {
                        return Ok(found);
                    }
                }
            }
            Ok(response) => {
                tracing::debug!("Page fetch for discovery returned {}", response.status());
            }
            Err(e) => {
                tracing::debug!("Page fetch for discovery failed: {}", e);
            }
        }

        let probed = self.probe_common_paths(&base).await;
        if !probed.is_empty() {
            return Ok(probed);
        }

        self.discover_rendered(site_url).await
    }

    /// Render the page in the browser and scan the rendered document for
    /// feed declarations. Also exposed directly through the HTTP surface.
    pub async fn discover_rendered(&self, site_url: &str) -> Result<Vec<String>> {
        let base = Url::parse(site_url)?;
        let page = tokio::time::timeout(
            self.config.render_timeout(),
            self.renderer.render(site_url, self.config.settle()),
        )
        .await;

        match page {
            Ok(Ok(rendered)) => Ok(scan_feed_links(&rendered.content, &base)),
            Ok(Err(e)) => {
                tracing::warn!("Rendered discovery failed for {}: {}", site_url, e);
                Ok(Vec::new())
            }
            Err(_) => {
                tracing::warn!("Rendered discovery timed out for {}", site_url);
                Ok(Vec::new())
            }
        }
    }

    /// Lightweight existence checks against the conventional paths,
    /// accepting the first whose content type looks like a feed.
    async fn probe_common_paths(&self, base: &Url) -> Vec<String> {
        let origin = base.origin().ascii_serialization();

        for path in COMMON_FEED_PATHS {
            let candidate = format!("{}{}", origin, path);
            let response = match self.client.head(&candidate).send().await {
                Ok(r) => r,
                Err(e) => {
                    tracing::debug!("Probe {} failed: {}", candidate, e);
                    continue;
                }
            };

            if !response.status().is_success() {
                continue;
            }

            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("");

            if ["xml", "rss", "atom", "json"]
                .iter()
                .any(|marker| content_type.contains(marker))
            {
                return vec![candidate];
            }
        }

        Vec::new()
    }
}

fn link_tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<link\b[^>]*>").expect("link tag regex"))
}

fn attr_regex(name: &str) -> Regex {
    Regex::new(&format!(r#"(?i){}\s*=\s*["']([^"']*)["']"#, name)).expect("attr regex")
}

/// Scan HTML for `<link>` declarations with RSS/Atom MIME types, resolving
/// relative hrefs against `base`.
pub fn scan_feed_links(html: &str, base: &Url) -> Vec<String> {
    let type_re = attr_regex("type");
    let href_re = attr_regex("href");

    let mut found = Vec::new();
    for tag in link_tag_regex().find_iter(html) {
        let tag = tag.as_str();

        let mime = match type_re.captures(tag) {
            Some(caps) => caps[1].to_ascii_lowercase(),
            None => continue,
        };
        if !mime.contains("rss") && !mime.contains("atom") {
            continue;
        }

        let href = match href_re.captures(tag) {
            Some(caps) => caps[1].to_string(),
            None => continue,
        };

        match base.join(&href) {
            Ok(absolute) => {
                let absolute = absolute.to_string();
                if !found.contains(&absolute) {
                    found.push(absolute);
                }
            }
            Err(e) => tracing::debug!("Skipping unresolvable feed href {}: {}", href, e),
        }
    }

    found
}
