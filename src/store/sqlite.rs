use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use rusqlite_migration::{Migrations, M};

use crate::app::{FeedmailError, Result};
use crate::domain::{SeenPost, Subscription};
use crate::store::Store;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../migrations/001-initial/up.sql"
        ))]);

        let mut conn = self.lock()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        migrations
            .to_latest(&mut conn)
            .map_err(|e| FeedmailError::Other(format!("Migration error: {}", e)))?;

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| FeedmailError::Other(format!("Store lock poisoned: {}", e)))
    }

    fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| s.parse::<DateTime<Utc>>().ok())
    }

    fn row_to_subscription(row: &rusqlite::Row<'_>) -> rusqlite::Result<Subscription> {
        Ok(Subscription {
            id: row.get(0)?,
            user_id: row.get(1)?,
            title: row.get(2)?,
            site_url: row.get(3)?,
            feed_url: row.get(4)?,
            last_checked: row
                .get::<_, Option<String>>(5)?
                .and_then(|s| Self::parse_datetime(&s)),
            last_post_date: row
                .get::<_, Option<String>>(6)?
                .and_then(|s| Self::parse_datetime(&s)),
            created_at: row
                .get::<_, String>(7)
                .ok()
                .and_then(|s| Self::parse_datetime(&s))
                .unwrap_or_else(Utc::now),
        })
    }

    fn row_to_post(row: &rusqlite::Row<'_>) -> rusqlite::Result<SeenPost> {
        Ok(SeenPost {
            id: row.get(0)?,
            blog_id: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            url: row.get(4)?,
            published_at: row
                .get::<_, String>(5)
                .ok()
                .and_then(|s| Self::parse_datetime(&s))
                .unwrap_or_else(Utc::now),
            sent_at: row
                .get::<_, Option<String>>(6)?
                .and_then(|s| Self::parse_datetime(&s)),
        })
    }
}

const SUBSCRIPTION_COLUMNS: &str =
    "id, user_id, title, site_url, feed_url, last_checked, last_post_date, created_at";

const POST_COLUMNS: &str = "id, blog_id, title, description, url, published_at, sent_at";

impl Store for SqliteStore {
    fn add_subscription(&self, sub: &Subscription) -> Result<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO subscriptions (user_id, title, site_url, feed_url, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                sub.user_id,
                sub.title,
                sub.site_url,
                sub.feed_url,
                sub.created_at.to_rfc3339()
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn get_subscription(&self, id: i64) -> Result<Option<Subscription>> {
        let conn = self.lock()?;
        let result = conn
            .query_row(
                &format!("SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE id = ?1"),
                params![id],
                Self::row_to_subscription,
            )
            .optional()?;
        Ok(result)
    }

    fn get_subscription_by_feed_url(&self, feed_url: &str) -> Result<Option<Subscription>> {
        let conn = self.lock()?;
        let result = conn
            .query_row(
                &format!("SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE feed_url = ?1"),
                params![feed_url],
                Self::row_to_subscription,
            )
            .optional()?;
        Ok(result)
    }

    fn get_all_subscriptions(&self) -> Result<Vec<Subscription>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions ORDER BY title, feed_url"
        ))?;
        let subs = stmt
            .query_map([], Self::row_to_subscription)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(subs)
    }

    fn delete_subscription(&self, id: i64) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM subscriptions WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn set_last_checked(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE subscriptions SET last_checked = ?1 WHERE id = ?2",
            params![at.to_rfc3339(), id],
        )?;
        Ok(())
    }

    fn set_last_post_date(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE subscriptions SET last_post_date = ?1 WHERE id = ?2",
            params![at.to_rfc3339(), id],
        )?;
        Ok(())
    }

    fn insert_post(&self, post: &SeenPost) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR IGNORE INTO posts (id, blog_id, title, description, url, published_at, sent_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                post.id,
                post.blog_id,
                post.title,
                post.description,
                post.url,
                post.published_at.to_rfc3339(),
                post.sent_at.map(|dt| dt.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    fn post_exists(&self, blog_id: i64, url: &str) -> Result<bool> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM posts WHERE blog_id = ?1 AND url = ?2",
            params![blog_id, url],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn get_posts_for_subscription(&self, blog_id: i64) -> Result<Vec<SeenPost>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE blog_id = ?1 ORDER BY published_at DESC"
        ))?;
        let posts = stmt
            .query_map(params![blog_id], Self::row_to_post)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(posts)
    }

    fn mark_post_sent(&self, post_id: &str, at: DateTime<Utc>) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE posts SET sent_at = ?1 WHERE id = ?2",
            params![at.to_rfc3339(), post_id],
        )?;
        Ok(())
    }

    fn ensure_user(&self, email: &str) -> Result<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR IGNORE INTO users (email, created_at) VALUES (?1, ?2)",
            params![email, Utc::now().to_rfc3339()],
        )?;
        let id: i64 = conn.query_row(
            "SELECT id FROM users WHERE email = ?1",
            params![email],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn get_user_email(&self, user_id: i64) -> Result<Option<String>> {
        let conn = self.lock()?;
        let result = conn
            .query_row(
                "SELECT email FROM users WHERE id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn store_with_subscription() -> (SqliteStore, i64) {
        let store = SqliteStore::in_memory().unwrap();
        let user_id = store.ensure_user("reader@example.com").unwrap();
        let sub = Subscription::new(
            user_id,
            "Example Blog".into(),
            "https://example.com".into(),
            "https://example.com/feed.xml".into(),
        );
        let id = store.add_subscription(&sub).unwrap();
        (store, id)
    }

    #[test]
    fn test_add_and_get_subscription() {
        let (store, id) = store_with_subscription();
        let sub = store.get_subscription(id).unwrap().unwrap();
        assert_eq!(sub.title, "Example Blog");
        assert_eq!(sub.feed_url, "https://example.com/feed.xml");
        assert!(sub.last_checked.is_none());
        assert!(sub.last_post_date.is_none());
    }

    #[test]
    fn test_get_subscription_by_feed_url() {
        let (store, id) = store_with_subscription();
        let sub = store
            .get_subscription_by_feed_url("https://example.com/feed.xml")
            .unwrap()
            .unwrap();
        assert_eq!(sub.id, id);
        assert!(store
            .get_subscription_by_feed_url("https://other.com/feed.xml")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_timestamps_round_trip() {
        let (store, id) = store_with_subscription();
        let checked = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap();
        let posted = Utc.with_ymd_and_hms(2024, 4, 30, 23, 0, 0).unwrap();
        store.set_last_checked(id, checked).unwrap();
        store.set_last_post_date(id, posted).unwrap();

        let sub = store.get_subscription(id).unwrap().unwrap();
        assert_eq!(sub.last_checked, Some(checked));
        assert_eq!(sub.last_post_date, Some(posted));
    }

    #[test]
    fn test_insert_post_is_idempotent_per_url() {
        let (store, id) = store_with_subscription();
        let post = SeenPost::new(
            id,
            "Post".into(),
            None,
            "https://example.com/post".into(),
            Utc::now(),
        );
        store.insert_post(&post).unwrap();
        store.insert_post(&post).unwrap();

        let posts = store.get_posts_for_subscription(id).unwrap();
        assert_eq!(posts.len(), 1);
        assert!(store.post_exists(id, "https://example.com/post").unwrap());
        assert!(!store.post_exists(id, "https://example.com/other").unwrap());
    }

    #[test]
    fn test_mark_post_sent() {
        let (store, id) = store_with_subscription();
        let post = SeenPost::new(
            id,
            "Post".into(),
            None,
            "https://example.com/post".into(),
            Utc::now(),
        );
        store.insert_post(&post).unwrap();

        let sent = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        store.mark_post_sent(&post.id, sent).unwrap();

        let posts = store.get_posts_for_subscription(id).unwrap();
        assert_eq!(posts[0].sent_at, Some(sent));
    }

    #[test]
    fn test_ensure_user_is_idempotent() {
        let store = SqliteStore::in_memory().unwrap();
        let a = store.ensure_user("reader@example.com").unwrap();
        let b = store.ensure_user("reader@example.com").unwrap();
        assert_eq!(a, b);
        assert_eq!(
            store.get_user_email(a).unwrap(),
            Some("reader@example.com".into())
        );
    }

    #[test]
    fn test_reopen_preserves_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feedmail.db");

        let id = {
            let store = SqliteStore::new(&path).unwrap();
            let user_id = store.ensure_user("reader@example.com").unwrap();
            let sub = Subscription::new(
                user_id,
                "Example Blog".into(),
                "https://example.com".into(),
                "https://example.com/feed.xml".into(),
            );
            store.add_subscription(&sub).unwrap()
        };

        let store = SqliteStore::new(&path).unwrap();
        let sub = store.get_subscription(id).unwrap().unwrap();
        assert_eq!(sub.title, "Example Blog");
    }

    #[test]
    fn test_delete_subscription_cascades_posts() {
        let (store, id) = store_with_subscription();
        let post = SeenPost::new(
            id,
            "Post".into(),
            None,
            "https://example.com/post".into(),
            Utc::now(),
        );
        store.insert_post(&post).unwrap();
        store.delete_subscription(id).unwrap();
        assert!(store.get_subscription(id).unwrap().is_none());
        assert!(store.get_posts_for_subscription(id).unwrap().is_empty());
    }
}
