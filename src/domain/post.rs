use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The durable record marking one feed item as processed for a subscription.
///
/// At most one row exists per (subscription, canonical URL) pair; that pair
/// is the dedup key. `sent_at` is set only after a notification is
/// delivered, so a row with a null `sent_at` marks a known, undelivered
/// notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeenPost {
    pub id: String,
    pub blog_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

impl SeenPost {
    pub fn new(
        blog_id: i64,
        title: String,
        description: Option<String>,
        url: String,
        published_at: DateTime<Utc>,
    ) -> Self {
        let id = Self::generate_id(blog_id, &url);
        Self {
            id,
            blog_id,
            title,
            description,
            url,
            published_at,
            sent_at: None,
        }
    }

    /// Deterministic ID from subscription id and canonical URL.
    pub fn generate_id(blog_id: i64, url: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(blog_id.to_le_bytes());
        hasher.update(url.as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_generation_deterministic() {
        let id1 = SeenPost::generate_id(1, "https://example.com/post");
        let id2 = SeenPost::generate_id(1, "https://example.com/post");
        assert_eq!(id1, id2);
    }

    #[test]
    fn test_id_generation_differs_by_subscription_and_url() {
        let id1 = SeenPost::generate_id(1, "https://example.com/post");
        let id2 = SeenPost::generate_id(2, "https://example.com/post");
        let id3 = SeenPost::generate_id(1, "https://example.com/other");
        assert_ne!(id1, id2);
        assert_ne!(id1, id3);
    }

    #[test]
    fn test_id_is_hex_sha256() {
        let id = SeenPost::generate_id(1, "https://example.com/post");
        assert_eq!(id.len(), 64);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
