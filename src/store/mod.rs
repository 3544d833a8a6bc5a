pub mod sqlite;

use chrono::{DateTime, Utc};

use crate::app::Result;
use crate::domain::{SeenPost, Subscription};

pub use sqlite::SqliteStore;

/// Narrow read/update contract over the persistent record store.
///
/// Subscriptions and seen posts are owned by the store; the pipeline holds
/// only transient views during one run.
pub trait Store {
    // Subscription operations
    fn add_subscription(&self, sub: &Subscription) -> Result<i64>;
    fn get_subscription(&self, id: i64) -> Result<Option<Subscription>>;
    fn get_subscription_by_feed_url(&self, feed_url: &str) -> Result<Option<Subscription>>;
    fn get_all_subscriptions(&self) -> Result<Vec<Subscription>>;
    fn delete_subscription(&self, id: i64) -> Result<()>;
    fn set_last_checked(&self, id: i64, at: DateTime<Utc>) -> Result<()>;
    fn set_last_post_date(&self, id: i64, at: DateTime<Utc>) -> Result<()>;

    // Seen-post operations
    fn insert_post(&self, post: &SeenPost) -> Result<()>;
    fn post_exists(&self, blog_id: i64, url: &str) -> Result<bool>;
    fn get_posts_for_subscription(&self, blog_id: i64) -> Result<Vec<SeenPost>>;
    fn mark_post_sent(&self, post_id: &str, at: DateTime<Utc>) -> Result<()>;

    // User operations
    fn ensure_user(&self, email: &str) -> Result<i64>;
    fn get_user_email(&self, user_id: i64) -> Result<Option<String>>;
}
