use std::sync::Arc;

use crate::app::error::Result;
use crate::config::Config;
use crate::mailer::{HttpMailer, Mailer};
use crate::normalizer::Normalizer;
use crate::pipeline::FeedChecker;
use crate::retriever::{ChromeRenderer, FeedRetriever, Renderer, Retrieve};
use crate::store::sqlite::SqliteStore;

/// Wires the long-lived components together from configuration.
pub struct AppContext {
    pub config: Config,
    pub store: Arc<SqliteStore>,
    pub client: reqwest::Client,
    pub renderer: Arc<dyn Renderer>,
    pub retriever: Arc<FeedRetriever>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppContext {
    pub fn new(config: Config) -> Result<Self> {
        let db_path = config.database_path()?;
        let store = Arc::new(SqliteStore::new(&db_path)?);
        Self::with_store(config, store)
    }

    pub fn in_memory(config: Config) -> Result<Self> {
        let store = Arc::new(SqliteStore::in_memory()?);
        Self::with_store(config, store)
    }

    fn with_store(config: Config, store: Arc<SqliteStore>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.retriever.fetch_timeout())
            .build()?;

        let renderer: Arc<dyn Renderer> = Arc::new(ChromeRenderer::new(config.retriever.clone()));
        let retriever = Arc::new(FeedRetriever::new(
            client.clone(),
            renderer.clone(),
            Normalizer::new(),
            config.retriever.clone(),
        ));
        let mailer: Arc<dyn Mailer> = Arc::new(HttpMailer::new(client.clone(), config.mailer.clone()));

        Ok(Self {
            config,
            store,
            client,
            renderer,
            retriever,
            mailer,
        })
    }

    /// One-pass pipeline over this context's components.
    pub fn checker(&self) -> FeedChecker<SqliteStore> {
        FeedChecker::new(
            self.store.clone(),
            self.retriever.clone() as Arc<dyn Retrieve>,
            self.mailer.clone(),
        )
    }
}
