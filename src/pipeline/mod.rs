//! One full pass over all subscriptions.
//!
//! Each subscription is processed independently; any failure is converted
//! into a per-subscription status in the [`RunReport`] and never aborts the
//! run. Only failing to read the subscription list at all is a top-level
//! error.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::app::Result;
use crate::dedup::{Advance, DedupAdvancer};
use crate::domain::{SeenPost, Subscription};
use crate::mailer::{format_post_email, EmailMessage, Mailer};
use crate::retriever::Retrieve;
use crate::store::Store;

pub mod status {
    pub const NO_ITEMS: &str = "No new items found";
    pub const ALREADY_PROCESSED: &str = "Post already processed";
    pub const NOT_NEWER: &str = "No new posts since last check";
    pub const SENT: &str = "Email sent successfully";
    pub const SEND_FAILED: &str = "Error sending email";
    pub const NO_OWNER_EMAIL: &str = "User email not found";
    pub const INSERT_FAILED: &str = "Error inserting new post";
    pub const RETRIEVAL_FAILED: &str = "Feed retrieval failed";
    pub const PROCESSING_ERROR: &str = "Error processing blog";
}

/// Per-subscription result of one run.
#[derive(Debug, Clone, Serialize)]
pub struct CheckOutcome {
    pub blog: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "messageId", skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

impl CheckOutcome {
    fn new(blog: &str, status: &str) -> Self {
        Self {
            blog: blog.to_string(),
            status: status.to_string(),
            post: None,
            error: None,
            message_id: None,
        }
    }

    fn with_post(mut self, post: impl Into<String>) -> Self {
        self.post = Some(post.into());
        self
    }

    fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Aggregated report for one invocation.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub processed: usize,
    pub results: Vec<CheckOutcome>,
}

/// Iterates all subscriptions once, isolating per-subscription failures.
pub struct FeedChecker<S> {
    store: Arc<S>,
    retriever: Arc<dyn Retrieve>,
    advancer: DedupAdvancer,
    mailer: Arc<dyn Mailer>,
}

impl<S: Store + Send + Sync> FeedChecker<S> {
    pub fn new(store: Arc<S>, retriever: Arc<dyn Retrieve>, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            store,
            retriever,
            advancer: DedupAdvancer::new(),
            mailer,
        }
    }

    /// Run one pass. Subscriptions are processed sequentially; side effects
    /// per subscription are ordered so that an interrupted run is safe to
    /// resume (insert the SeenPost before sending the email).
    pub async fn run_once(&self) -> Result<RunReport> {
        let subscriptions = self.store.get_all_subscriptions()?;
        let processed = subscriptions.len();
        let mut results = Vec::with_capacity(processed);

        for sub in subscriptions {
            let outcome = match self.check_subscription(&sub).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!("Error processing {}: {}", sub.title, e);
                    CheckOutcome::new(&sub.title, status::PROCESSING_ERROR)
                        .with_error(e.to_string())
                }
            };
            tracing::info!("{}: {}", outcome.blog, outcome.status);
            results.push(outcome);
        }

        Ok(RunReport { processed, results })
    }

    async fn check_subscription(&self, sub: &Subscription) -> Result<CheckOutcome> {
        self.store.set_last_checked(sub.id, Utc::now())?;

        let feed = match self.retriever.retrieve(sub).await {
            Ok(feed) => feed,
            Err(e) => {
                return Ok(
                    CheckOutcome::new(&sub.title, status::RETRIEVAL_FAILED)
                        .with_error(e.to_string()),
                )
            }
        };

        let advance = self.advancer.advance(sub, feed.items, self.store.as_ref())?;

        let (item, published) = match advance {
            Advance::NoItems => return Ok(CheckOutcome::new(&sub.title, status::NO_ITEMS)),
            Advance::AlreadySeen { title } => {
                let mut outcome = CheckOutcome::new(&sub.title, status::ALREADY_PROCESSED);
                if let Some(title) = title {
                    outcome = outcome.with_post(title);
                }
                return Ok(outcome);
            }
            Advance::NotNewer { title } => {
                let mut outcome = CheckOutcome::new(&sub.title, status::NOT_NEWER);
                if let Some(title) = title {
                    outcome = outcome.with_post(title);
                }
                return Ok(outcome);
            }
            Advance::NewPost { item, published } => (item, published),
        };

        let post_title = item.display_title().to_string();
        let description = item.extract_description();
        let url = item.link.clone().unwrap_or_default();

        let post = SeenPost::new(
            sub.id,
            post_title.clone(),
            Some(description.clone()),
            url.clone(),
            published,
        );

        // Insert before send: a crash between the two leaves a known,
        // unsent post rather than a duplicate email on the next run
        if let Err(e) = self.store.insert_post(&post) {
            return Ok(CheckOutcome::new(&sub.title, status::INSERT_FAILED)
                .with_error(e.to_string()));
        }
        self.store.set_last_post_date(sub.id, published)?;

        let Some(email) = self.store.get_user_email(sub.user_id)? else {
            return Ok(
                CheckOutcome::new(&sub.title, status::NO_OWNER_EMAIL).with_post(post_title)
            );
        };

        let message = EmailMessage {
            to: email,
            subject: format!("New Post: {}", post_title),
            html: format_post_email(&sub.title, &post_title, &description, &url),
        };

        match self.mailer.deliver(&message).await {
            Ok(receipt) => {
                self.store.mark_post_sent(&post.id, Utc::now())?;
                let mut outcome =
                    CheckOutcome::new(&sub.title, status::SENT).with_post(post_title);
                outcome.message_id = Some(receipt.message_id);
                Ok(outcome)
            }
            Err(e) => Ok(CheckOutcome::new(&sub.title, status::SEND_FAILED)
                .with_post(post_title)
                .with_error(e.to_string())),
        }
    }
}
