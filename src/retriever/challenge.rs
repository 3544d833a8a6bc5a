/// Markers that show up in the body of bot-verification interstitials.
const BODY_MARKERS: &[&str] = &[
    "cf-browser-verification",
    "cf_captcha_entry",
    "challenge-platform",
    "_cf_chl_opt",
];

/// Phrases challenge pages put in the document title.
const TITLE_PHRASES: &[&str] = &["Attention Required", "Security Check", "Just a moment"];

/// Heuristic detector for anti-bot challenge pages.
///
/// Best effort only: false negatives are expected and handled by the
/// retrieval fallback chain, not by sharpening this check.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChallengeDetector;

impl ChallengeDetector {
    pub fn new() -> Self {
        Self
    }

    pub fn looks_challenged(&self, body: &str, title: &str) -> bool {
        BODY_MARKERS.iter().any(|marker| body.contains(marker))
            || TITLE_PHRASES.iter().any(|phrase| title.contains(phrase))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_body_markers() {
        let detector = ChallengeDetector::new();
        assert!(detector.looks_challenged(
            "<html><div id=\"cf-browser-verification\"></div></html>",
            ""
        ));
        assert!(detector.looks_challenged("<form id=\"cf_captcha_entry\">", ""));
    }

    #[test]
    fn test_detects_title_phrases() {
        let detector = ChallengeDetector::new();
        assert!(detector.looks_challenged("<html></html>", "Attention Required! | Cloudflare"));
        assert!(detector.looks_challenged("", "Just a moment..."));
    }

    #[test]
    fn test_plain_page_passes() {
        let detector = ChallengeDetector::new();
        assert!(!detector.looks_challenged(
            "<rss version=\"2.0\"><channel></channel></rss>",
            "Example Blog"
        ));
    }
}
