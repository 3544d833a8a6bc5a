use html_escape::decode_html_entities;

use crate::app::{FeedmailError, Result};
use crate::domain::{NormalizedFeed, NormalizedItem};
use crate::retriever::wp::WpPost;

/// The wire shape a raw document arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// RSS / Atom / JSON Feed, parseable by feed-rs.
    Feed,
    /// A WordPress `wp-json/wp/v2/posts` array.
    WpJson,
}

/// Converts raw feed documents into [`NormalizedFeed`]s.
///
/// No network I/O happens here. A malformed document is an `Err` the
/// retrieval layer treats as a failed strategy; a structurally valid feed
/// with odd entries degrades those entries to `None` fields instead.
#[derive(Clone, Default)]
pub struct Normalizer;

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(&self, body: &[u8], kind: SourceKind) -> Result<NormalizedFeed> {
        match kind {
            SourceKind::Feed => self.normalize_feed(body),
            SourceKind::WpJson => self.normalize_wp_json(body),
        }
    }

    fn normalize_feed(&self, body: &[u8]) -> Result<NormalizedFeed> {
        let feed = feed_rs::parser::parse(body)
            .map_err(|e| FeedmailError::FeedParse(e.to_string()))?;

        let title = feed
            .title
            .map(|t| decode_html_entities(&t.content).to_string());

        let items = feed
            .entries
            .into_iter()
            .map(|entry| NormalizedItem {
                title: entry
                    .title
                    .map(|t| decode_html_entities(&t.content).to_string()),
                link: entry.links.first().map(|l| l.href.clone()),
                published: entry.published.or(entry.updated),
                raw_date: None,
                summary: entry
                    .summary
                    .map(|s| decode_html_entities(&s.content).to_string()),
                content: entry
                    .content
                    .and_then(|c| c.body)
                    .map(|b| decode_html_entities(&b).to_string()),
                author: entry.authors.first().map(|a| a.name.clone()),
            })
            .collect();

        Ok(NormalizedFeed { title, items })
    }

    fn normalize_wp_json(&self, body: &[u8]) -> Result<NormalizedFeed> {
        let posts: Vec<WpPost> = serde_json::from_slice(body)
            .map_err(|e| FeedmailError::FeedParse(format!("Invalid posts payload: {}", e)))?;

        let items = posts.into_iter().map(NormalizedItem::from).collect();

        Ok(NormalizedFeed { title: None, items })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    const RSS_SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Test Blog</title>
    <description>A test blog</description>
    <item>
      <title>First Post</title>
      <link>https://example.com/first</link>
      <guid>post-1</guid>
      <pubDate>Mon, 01 Jan 2024 00:00:00 GMT</pubDate>
      <description>This is the first post</description>
    </item>
    <item>
      <title>Second Post &amp; More</title>
      <link>https://example.com/second</link>
      <guid>post-2</guid>
      <description>This is the second post</description>
    </item>
  </channel>
</rss>"#;

    const ATOM_SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Blog</title>
  <entry>
    <title>Atom Entry</title>
    <link href="https://example.com/atom1"/>
    <id>atom-entry-1</id>
    <updated>2024-01-01T00:00:00Z</updated>
    <summary>This is an Atom entry</summary>
  </entry>
</feed>"#;

    const WP_JSON_SAMPLE: &str = r#"[
      {
        "title": { "rendered": "WP Post &amp; Friends" },
        "link": "https://example.com/wp-post",
        "date": "2024-02-01T10:00:00",
        "author_name": "Alice",
        "excerpt": { "rendered": "<p>An excerpt</p>" },
        "content": { "rendered": "<p>Full content</p>" }
      }
    ]"#;

    #[test]
    fn test_normalize_rss_preserves_source_order() {
        let normalizer = Normalizer::new();
        let feed = normalizer
            .normalize(RSS_SAMPLE.as_bytes(), SourceKind::Feed)
            .unwrap();

        assert_eq!(feed.title, Some("Test Blog".into()));
        assert_eq!(feed.items.len(), 2);
        assert_eq!(feed.items[0].title, Some("First Post".into()));
        assert_eq!(feed.items[0].link, Some("https://example.com/first".into()));
        assert_eq!(
            feed.items[0].published,
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(feed.items[1].title, Some("Second Post & More".into()));
        assert!(feed.items[1].published.is_none());
    }

    #[test]
    fn test_normalize_atom_uses_updated_as_published() {
        let normalizer = Normalizer::new();
        let feed = normalizer
            .normalize(ATOM_SAMPLE.as_bytes(), SourceKind::Feed)
            .unwrap();

        assert_eq!(feed.title, Some("Atom Blog".into()));
        assert_eq!(feed.items.len(), 1);
        assert_eq!(
            feed.items[0].published,
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(feed.items[0].summary, Some("This is an Atom entry".into()));
    }

    #[test]
    fn test_normalize_wp_json() {
        let normalizer = Normalizer::new();
        let feed = normalizer
            .normalize(WP_JSON_SAMPLE.as_bytes(), SourceKind::WpJson)
            .unwrap();

        assert_eq!(feed.items.len(), 1);
        let item = &feed.items[0];
        assert_eq!(item.title, Some("WP Post & Friends".into()));
        assert_eq!(item.link, Some("https://example.com/wp-post".into()));
        assert_eq!(item.author, Some("Alice".into()));
        assert_eq!(item.raw_date, Some("2024-02-01T10:00:00".into()));
        assert_eq!(item.extract_description(), "An excerpt");
    }

    #[test]
    fn test_malformed_document_is_an_error_not_a_panic() {
        let normalizer = Normalizer::new();
        assert!(normalizer
            .normalize(b"this is not a feed", SourceKind::Feed)
            .is_err());
        assert!(normalizer
            .normalize(b"{\"not\": \"an array\"}", SourceKind::WpJson)
            .is_err());
    }
}
