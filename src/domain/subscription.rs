use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user's association with one feed source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub site_url: String,
    pub feed_url: String,
    pub last_checked: Option<DateTime<Utc>>,
    pub last_post_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Subscription {
    pub fn new(user_id: i64, title: String, site_url: String, feed_url: String) -> Self {
        Self {
            id: 0,
            user_id,
            title,
            site_url,
            feed_url,
            last_checked: None,
            last_post_date: None,
            created_at: Utc::now(),
        }
    }
}
