//! HTTP surface: the check trigger plus feed debugging endpoints.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use reqwest::header::{ACCEPT, USER_AGENT};
use serde::Deserialize;
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::app::FeedmailError;
use crate::config::RetrieverConfig;
use crate::pipeline::FeedChecker;
use crate::retriever::strategies::{extract_feed_markup, FEED_ACCEPT};
use crate::retriever::wp::{self, WpPost};
use crate::retriever::{ChallengeDetector, FeedRetriever, Renderer};
use crate::store::SqliteStore;
use url::Url;

/// Shared state for all handlers.
pub struct AppState {
    pub api_key: String,
    pub checker: FeedChecker<SqliteStore>,
    pub retriever: Arc<FeedRetriever>,
    pub renderer: Arc<dyn Renderer>,
    pub detector: ChallengeDetector,
    pub client: reqwest::Client,
    pub retriever_config: RetrieverConfig,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/cron/check-feeds", get(check_feeds))
        .route("/api/detect-feed", get(detect_feed))
        .route("/api/fetch-feed", get(fetch_feed))
        .route("/api/proxy-feed", get(proxy_feed))
        .route("/health", get(health))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// Bind and serve until shutdown.
pub async fn serve(router: Router, bind: &str) -> crate::app::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!("Listening on {}", bind);
    axum::serve(listener, router).await?;
    Ok(())
}

async fn health() -> &'static str {
    "OK"
}

#[derive(Deserialize)]
struct CheckParams {
    #[serde(rename = "apiKey")]
    api_key: Option<String>,
}

/// The scheduler's trigger. The shared secret is checked before anything
/// touches the store; an unset secret rejects every request.
async fn check_feeds(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CheckParams>,
) -> Response {
    let authorized =
        !state.api_key.is_empty() && params.api_key.as_deref() == Some(state.api_key.as_str());
    if !authorized {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "Unauthorized"})),
        )
            .into_response();
    }

    match state.checker.run_once().await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => {
            tracing::error!("Check run failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Internal server error",
                    "message": e.to_string(),
                })),
            )
                .into_response()
        }
    }
}

#[derive(Deserialize)]
struct UrlParams {
    url: Option<String>,
}

async fn detect_feed(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UrlParams>,
) -> Response {
    let Some(url) = params.url else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "URL parameter is required"})),
        )
            .into_response();
    };

    match state.retriever.discoverer().discover(&url).await {
        Ok(found) if found.is_empty() => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "No feed URLs found"})),
        )
            .into_response(),
        Ok(found) => {
            let count = found.len();
            (
                StatusCode::OK,
                Json(json!({"feedUrls": found, "count": count})),
            )
                .into_response()
        }
        Err(FeedmailError::InvalidUrl(e)) => (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": format!("Invalid URL: {}", e)})),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Feed detection failed for {}: {}", url, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal server error"})),
            )
                .into_response()
        }
    }
}

/// Rendered retrieval that hands back raw feed markup. When the page stays
/// challenged, falls back to synthesizing RSS from the WordPress API before
/// reporting the block.
async fn fetch_feed(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UrlParams>,
) -> Response {
    let Some(url) = params.url else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "URL parameter is required"})),
        )
            .into_response();
    };
    let parsed = match Url::parse(&url) {
        Ok(parsed) => parsed,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": format!("Invalid URL: {}", e)})),
            )
                .into_response()
        }
    };

    let config = &state.retriever_config;
    let rendered = tokio::time::timeout(
        config.render_timeout(),
        state.renderer.render(&url, config.settle()),
    )
    .await;

    let mut page = match rendered {
        Ok(Ok(page)) => page,
        Ok(Err(e)) => {
            tracing::error!("Rendered fetch failed for {}: {}", url, e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal server error"})),
            )
                .into_response();
        }
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Rendered fetch timed out"})),
            )
                .into_response()
        }
    };

    if state.detector.looks_challenged(&page.content, &page.title) {
        let retried = tokio::time::timeout(
            config.render_timeout(),
            state.renderer.render(&url, config.challenge_wait()),
        )
        .await;
        if let Ok(Ok(retried)) = retried {
            page = retried;
        }

        if state.detector.looks_challenged(&page.content, &page.title) {
            if let Some(xml) = wp_synthesized_feed(&state, &parsed).await {
                return xml_response(xml);
            }
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"error": "Feed blocked by anti-bot challenge"})),
            )
                .into_response();
        }
    }

    if let Some(markup) = extract_feed_markup(&page.content) {
        return xml_response(markup.to_string());
    }

    if let Some(xml) = wp_synthesized_feed(&state, &parsed).await {
        return xml_response(xml);
    }

    (
        StatusCode::BAD_REQUEST,
        Json(json!({"error": "URL does not resolve to a feed"})),
    )
        .into_response()
}

async fn wp_synthesized_feed(state: &AppState, url: &Url) -> Option<String> {
    let endpoint = wp::wp_posts_url(url).ok()?;
    let response = state
        .client
        .get(endpoint)
        .header(USER_AGENT, state.retriever_config.user_agent.as_str())
        .send()
        .await
        .ok()?
        .error_for_status()
        .ok()?;
    let posts: Vec<WpPost> = response.json().await.ok()?;
    if posts.is_empty() {
        return None;
    }
    Some(wp::synthesize_rss(
        &posts,
        &url.origin().ascii_serialization(),
    ))
}

fn xml_response(body: String) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/rss+xml; charset=utf-8")],
        body,
    )
        .into_response()
}

#[derive(Deserialize)]
struct ProxyParams {
    url: Option<String>,
    #[serde(rename = "withHeaders")]
    with_headers: Option<String>,
}

/// Verbatim reverse proxy, optionally adding the feed-favoring headers.
async fn proxy_feed(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ProxyParams>,
) -> Response {
    let Some(url) = params.url else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "URL parameter is required"})),
        )
            .into_response();
    };

    let mut request = state.client.get(&url);
    if params.with_headers.as_deref() == Some("true") {
        request = request
            .header(ACCEPT, FEED_ACCEPT)
            .header(USER_AGENT, state.retriever_config.user_agent.as_str());
    }

    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!("Proxy fetch failed for {}: {}", url, e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": format!("Proxy fetch failed: {}", e)})),
            )
                .into_response();
        }
    };

    let status =
        StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();

    match response.bytes().await {
        Ok(body) => (status, [(header::CONTENT_TYPE, content_type)], body).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": format!("Proxy read failed: {}", e)})),
        )
            .into_response(),
    }
}
