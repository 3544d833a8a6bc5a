use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum description length before truncation.
pub const DESCRIPTION_MAX_LEN: usize = 200;

const NO_DESCRIPTION: &str = "No description available.";

/// A feed entry reduced to the shape the pipeline cares about.
///
/// Produced fresh by the normalizer on every retrieval; never persisted
/// directly. `published` holds a machine-parsed timestamp, `raw_date` a
/// human-formatted date string when that is all the source offered.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NormalizedItem {
    pub title: Option<String>,
    pub link: Option<String>,
    pub published: Option<DateTime<Utc>>,
    pub raw_date: Option<String>,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub author: Option<String>,
}

/// A retrieved feed: title plus items in source-document order.
#[derive(Debug, Clone, Default)]
pub struct NormalizedFeed {
    pub title: Option<String>,
    pub items: Vec<NormalizedItem>,
}

impl NormalizedItem {
    /// Resolve the publication date.
    ///
    /// Preference order: machine-parsed timestamp, then the raw date string
    /// (RFC 3339, then RFC 2822), then the current time. Items with no date
    /// at all are treated as brand-new; that is policy, not an accident.
    pub fn publication_date(&self) -> DateTime<Utc> {
        self.published
            .or_else(|| self.raw_date.as_deref().and_then(parse_loose_date))
            .unwrap_or_else(Utc::now)
    }

    /// Resolve a short plain-text description.
    ///
    /// Prefers the summary field; otherwise strips markup from the full
    /// content and truncates. Falls back to a fixed sentinel.
    pub fn extract_description(&self) -> String {
        if let Some(summary) = self.summary.as_deref() {
            let text = strip_tags(summary);
            if !text.trim().is_empty() {
                return truncate_text(&text, DESCRIPTION_MAX_LEN);
            }
        }

        if let Some(content) = self.content.as_deref() {
            let text = strip_tags(content);
            if !text.trim().is_empty() {
                return truncate_text(&text, DESCRIPTION_MAX_LEN);
            }
        }

        NO_DESCRIPTION.to_string()
    }

    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("(Untitled)")
    }
}

fn parse_loose_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s).or_else(|_| DateTime::parse_from_rfc2822(s)) {
        return Some(dt.with_timezone(&Utc));
    }
    // WordPress emits zone-less timestamps like "2024-02-01T10:00:00"
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Remove markup tags from a fragment of HTML.
fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

/// Truncate to at most `max_len` characters, appending `...` when cut.
///
/// Counts characters rather than bytes so a cut never lands inside a
/// multi-byte sequence; trailing whitespace is trimmed before the ellipsis.
fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_string();
    }

    let cut: String = text.chars().take(max_len).collect();
    format!("{}...", cut.trim_end())
}
