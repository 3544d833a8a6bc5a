use std::sync::Arc;

use url::Url;

use crate::app::{AppContext, FeedmailError, Result};
use crate::domain::Subscription;
use crate::retriever::ChallengeDetector;
use crate::server::{self, AppState};
use crate::store::Store;

pub async fn serve(ctx: AppContext, bind: Option<String>) -> Result<()> {
    let bind = bind.unwrap_or_else(|| ctx.config.server.bind.clone());

    let state = Arc::new(AppState {
        api_key: ctx.config.server.api_key.clone(),
        checker: ctx.checker(),
        retriever: ctx.retriever.clone(),
        renderer: ctx.renderer.clone(),
        detector: ChallengeDetector::new(),
        client: ctx.client.clone(),
        retriever_config: ctx.config.retriever.clone(),
    });

    let router = server::build_router(state);
    server::serve(router, &bind).await
}

pub async fn check(ctx: &AppContext) -> Result<()> {
    let report = ctx.checker().run_once().await?;
    let json = serde_json::to_string_pretty(&report)
        .map_err(|e| FeedmailError::Other(e.to_string()))?;
    println!("{}", json);
    Ok(())
}

pub async fn add_subscription(
    ctx: &AppContext,
    feed_url: &str,
    title: Option<String>,
    site: Option<String>,
    email: &str,
) -> Result<()> {
    if ctx.store.get_subscription_by_feed_url(feed_url)?.is_some() {
        println!("Subscription already exists: {}", feed_url);
        return Ok(());
    }

    let parsed = Url::parse(feed_url)?;
    let site_url = site.unwrap_or_else(|| parsed.origin().ascii_serialization());
    let title = title.unwrap_or_else(|| parsed.host_str().unwrap_or(feed_url).to_string());

    let user_id = ctx.store.ensure_user(email)?;
    let sub = Subscription::new(user_id, title, site_url, feed_url.to_string());
    ctx.store.add_subscription(&sub)?;

    println!("Added subscription: {} ({})", sub.title, feed_url);
    println!("Notifications go to: {}", email);
    Ok(())
}

pub fn list_subscriptions(ctx: &AppContext) -> Result<()> {
    let subs = ctx.store.get_all_subscriptions()?;

    if subs.is_empty() {
        println!("No subscriptions");
        return Ok(());
    }

    for sub in subs {
        let last_checked = sub
            .last_checked
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never".to_string());
        let last_post = sub
            .last_post_date
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "none".to_string());
        println!(
            "{}\n  feed: {}\n  last checked: {}  last post: {}",
            sub.title, sub.feed_url, last_checked, last_post
        );
    }
    Ok(())
}

pub fn remove_subscription(ctx: &AppContext, feed_url: &str) -> Result<()> {
    let sub = ctx
        .store
        .get_subscription_by_feed_url(feed_url)?
        .ok_or_else(|| FeedmailError::SubscriptionNotFound(feed_url.to_string()))?;

    ctx.store.delete_subscription(sub.id)?;
    println!("Removed subscription: {}", feed_url);
    Ok(())
}
