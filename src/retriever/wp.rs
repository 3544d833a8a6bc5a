//! WordPress REST API fallback helpers.
//!
//! Many blogs that aggressively challenge feed fetchers still expose the
//! conventional `wp-json/wp/v2/posts` endpoint. These helpers probe it and
//! synthesize an RSS document from the response when a caller needs markup
//! rather than normalized items.

use serde::Deserialize;
use url::Url;

use crate::app::{FeedmailError, Result};
use crate::domain::NormalizedItem;

pub const WP_POSTS_PATH: &str = "/wp-json/wp/v2/posts";
pub const WP_POSTS_PER_PAGE: u32 = 10;

/// A post-shaped record from the WordPress REST API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WpPost {
    #[serde(default)]
    pub title: Option<WpRendered>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub author_name: Option<String>,
    #[serde(default)]
    pub excerpt: Option<WpRendered>,
    #[serde(default)]
    pub content: Option<WpRendered>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WpRendered {
    #[serde(default)]
    pub rendered: String,
}

impl From<WpPost> for NormalizedItem {
    fn from(post: WpPost) -> Self {
        NormalizedItem {
            title: post
                .title
                .map(|t| html_escape::decode_html_entities(&t.rendered).to_string()),
            link: post.link,
            published: None,
            raw_date: post.date,
            summary: post
                .excerpt
                .map(|e| html_escape::decode_html_entities(&e.rendered).to_string()),
            content: post
                .content
                .map(|c| html_escape::decode_html_entities(&c.rendered).to_string()),
            author: post.author_name,
        }
    }
}

/// Conventional posts endpoint at the same origin as `url`.
pub fn wp_posts_url(url: &Url) -> Result<Url> {
    let origin = url.origin().ascii_serialization();
    let endpoint = format!("{}{}?per_page={}", origin, WP_POSTS_PATH, WP_POSTS_PER_PAGE);
    Url::parse(&endpoint).map_err(FeedmailError::InvalidUrl)
}

/// Synthesize an RSS 2.0 document from WordPress API posts.
pub fn synthesize_rss(posts: &[WpPost], origin: &str) -> String {
    let host = origin.split("//").nth(1).unwrap_or(origin);

    let items: String = posts
        .iter()
        .map(|post| {
            let title = post.title.as_ref().map(|t| t.rendered.as_str()).unwrap_or("");
            let excerpt = post
                .excerpt
                .as_ref()
                .map(|e| e.rendered.as_str())
                .unwrap_or("");
            let content = post
                .content
                .as_ref()
                .map(|c| c.rendered.as_str())
                .unwrap_or("");
            let pub_date = post
                .date
                .as_deref()
                .map(|d| escape_xml(d))
                .unwrap_or_default();
            format!(
                "    <item>\n      <title>{}</title>\n      <link>{}</link>\n      \
                 <pubDate>{}</pubDate>\n      <dc:creator>{}</dc:creator>\n      \
                 <description>{}</description>\n      <content:encoded>{}</content:encoded>\n    </item>\n",
                escape_xml(title),
                post.link.as_deref().unwrap_or(""),
                pub_date,
                escape_xml(post.author_name.as_deref().unwrap_or("Author")),
                escape_xml(excerpt),
                escape_xml(content),
            )
        })
        .collect();

    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <rss version=\"2.0\"\n  \
         xmlns:content=\"http://purl.org/rss/1.0/modules/content/\"\n  \
         xmlns:dc=\"http://purl.org/dc/elements/1.1/\"\n  \
         xmlns:atom=\"http://www.w3.org/2005/Atom\">\n  \
         <channel>\n    <title>{}</title>\n    <link>{}</link>\n    \
         <description>Latest posts from {}</description>\n{}  </channel>\n</rss>\n",
        escape_xml(host),
        origin,
        escape_xml(host),
        items
    )
}

fn escape_xml(unsafe_text: &str) -> String {
    unsafe_text
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
