//! # Feedmail
//!
//! Watches subscribed web feeds and emails one notification per genuinely
//! new post.
//!
//! ## Architecture
//!
//! ```text
//! Retriever → Normalizer → Dedup → Mailer
//!                ↑            ↓
//!              Store ←────────┘
//! ```
//!
//! - [`retriever`]: multi-strategy feed retrieval with browser rendering
//! - [`normalizer`]: converts raw feed documents to unified domain models
//! - [`dedup`]: decides whether a retrieved feed contains a new post
//! - [`mailer`]: notification email delivery
//! - [`pipeline`]: one pass over all subscriptions
//! - [`server`]: HTTP trigger and feed debugging endpoints
//!
//! ## Quick Start
//!
//! ```bash
//! # Watch a feed
//! feedmail add https://blog.rust-lang.org/feed.xml --email me@example.com
//!
//! # Run one check pass
//! feedmail check
//!
//! # Run the HTTP server for a scheduler to trigger
//! feedmail serve
//! ```

/// Application context and error handling.
///
/// [`AppContext`](app::AppContext) wires together store, retriever,
/// renderer and mailer from configuration.
pub mod app;

/// Command-line interface using clap.
pub mod cli;

/// Configuration management.
///
/// Loads from `~/.config/feedmail/config.toml`; missing fields fall back
/// to defaults.
pub mod config;

/// Decides whether a retrieved feed actually contains a new post.
pub mod dedup;

/// Core domain models.
///
/// - [`Subscription`](domain::Subscription): a watched feed and its owner
/// - [`SeenPost`](domain::SeenPost): a post already recorded, SHA256 IDs
/// - [`NormalizedItem`](domain::NormalizedItem): one feed entry
pub mod domain;

/// Notification email delivery behind the [`Mailer`](mailer::Mailer) trait.
pub mod mailer;

/// Feed parsing and normalization.
///
/// Converts RSS/Atom documents and WordPress API post arrays into
/// unified [`NormalizedItem`](domain::NormalizedItem) structs.
pub mod normalizer;

/// One full pass over all subscriptions, failures isolated per
/// subscription.
pub mod pipeline;

/// Multi-strategy feed retrieval.
///
/// Direct fetch, header-spoofed fetch, browser-rendered fetch and a
/// WordPress API fallback, tried in order; feed discovery when the stored
/// feed URL is a dead end. Uses headless Chrome via chromiumoxide for the
/// rendered paths.
pub mod retriever;

/// HTTP surface: the scheduler's trigger plus feed debugging endpoints.
pub mod server;

/// SQLite persistence layer.
///
/// - [`Store`](store::Store): trait defining storage operations
/// - [`SqliteStore`](store::SqliteStore): SQLite implementation
pub mod store;
