//! Decides whether a retrieved feed actually contains a new post.

use chrono::{DateTime, Utc};

use crate::app::Result;
use crate::domain::{NormalizedItem, Subscription};
use crate::store::Store;

/// Outcome of advancing a subscription against freshly retrieved items.
#[derive(Debug)]
pub enum Advance {
    /// The feed yielded nothing usable.
    NoItems,
    /// The newest item was already recorded for this subscription.
    AlreadySeen { title: Option<String> },
    /// The newest item is not newer than the last confirmed post.
    NotNewer { title: Option<String> },
    /// A genuinely new post; the caller persists the SeenPost and the
    /// advanced `last_post_date`.
    NewPost {
        item: NormalizedItem,
        published: DateTime<Utc>,
    },
}

#[derive(Clone, Default)]
pub struct DedupAdvancer;

impl DedupAdvancer {
    pub fn new() -> Self {
        Self
    }

    /// Pick the single newest unseen item, if any.
    ///
    /// Dates are resolved once up front: resolution can fall back to the
    /// current time, and re-resolving inside a comparator would make the
    /// sort unstable against itself. Items without a link are dropped
    /// before selection; the per-URL dedup key requires one.
    pub fn advance<S: Store>(
        &self,
        sub: &Subscription,
        items: Vec<NormalizedItem>,
        store: &S,
    ) -> Result<Advance> {
        let mut dated: Vec<(NormalizedItem, DateTime<Utc>)> = items
            .into_iter()
            .filter(|item| item.link.is_some())
            .map(|item| {
                let date = item.publication_date();
                (item, date)
            })
            .collect();

        if dated.is_empty() {
            return Ok(Advance::NoItems);
        }

        // Stable sort: equal timestamps keep source order
        dated.sort_by(|a, b| b.1.cmp(&a.1));

        let (candidate, published) = dated.swap_remove(0);
        let link = candidate.link.as_deref().unwrap_or_default();

        if store.post_exists(sub.id, link)? {
            return Ok(Advance::AlreadySeen {
                title: candidate.title,
            });
        }

        // Monotonicity guard, independent of the per-URL check; protects
        // against feeds that reorder or republish old items
        if let Some(last) = sub.last_post_date {
            if last >= published {
                return Ok(Advance::NotNewer {
                    title: candidate.title,
                });
            }
        }

        Ok(Advance::NewPost {
            item: candidate,
            published,
        })
    }
}
