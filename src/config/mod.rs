//! Configuration management.
//!
//! Configuration is read from `~/.config/feedmail/config.toml` at startup.
//! If the file doesn't exist, a default configuration with comments is
//! created. Missing fields fall back to defaults.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::app::{FeedmailError, Result};

/// Main configuration struct.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database path override. Defaults under the platform data directory.
    pub database: Option<PathBuf>,
    pub server: ServerConfig,
    pub mailer: MailerConfig,
    pub retriever: RetrieverConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP server binds to.
    pub bind: String,
    /// Shared secret checked by the trigger endpoint.
    pub api_key: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            api_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MailerConfig {
    /// Transactional email HTTP API endpoint.
    pub api_url: String,
    /// Bearer token for the email API.
    pub api_key: String,
    /// From address for notification emails.
    pub from: String,
}

impl Default for MailerConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.resend.com/emails".to_string(),
            api_key: String::new(),
            from: "Feedmail <noreply@feedmail.local>".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrieverConfig {
    /// Per-request timeout for plain HTTP fetches in seconds.
    pub fetch_timeout_secs: u64,
    /// Total budget for one rendered fetch (navigation + settle) in seconds.
    pub render_timeout_secs: u64,
    /// Wait after page load for dynamic content, in milliseconds.
    pub settle_ms: u64,
    /// Extra wait before re-reading a page that looked challenged.
    pub challenge_wait_ms: u64,
    /// Whether to run the browser headless.
    pub headless: bool,
    /// Maximum concurrent browser pages.
    pub max_concurrency: usize,
    /// Browser-like user agent for spoofed and rendered fetches.
    pub user_agent: String,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: 10,
            render_timeout_secs: 45,
            settle_ms: 3000,
            challenge_wait_ms: 5000,
            headless: true,
            max_concurrency: 5,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
        }
    }
}

impl RetrieverConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_secs)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn challenge_wait(&self) -> Duration {
        Duration::from_millis(self.challenge_wait_ms)
    }
}

impl Config {
    /// Load configuration from the default path, creating a commented
    /// default file when none exists.
    pub fn load() -> Result<Self> {
        let path = Self::default_config_path()?;
        if !path.exists() {
            Self::create_default_config(&path)?;
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| FeedmailError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| FeedmailError::Config("Could not find config directory".into()))?;
        Ok(config_dir.join("feedmail").join("config.toml"))
    }

    pub fn database_path(&self) -> Result<PathBuf> {
        if let Some(ref path) = self.database {
            return Ok(path.clone());
        }
        let data_dir = dirs::data_dir()
            .ok_or_else(|| FeedmailError::Config("Could not find data directory".into()))?;
        let dir = data_dir.join("feedmail");
        fs::create_dir_all(&dir)?;
        Ok(dir.join("feedmail.db"))
    }

    fn create_default_config(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::File::create(path)?;
        file.write_all(DEFAULT_CONFIG.as_bytes())?;
        Ok(())
    }
}

const DEFAULT_CONFIG: &str = r#"# Feedmail configuration

# Database path override (defaults under the platform data directory)
# database = "/var/lib/feedmail/feedmail.db"

[server]
# Address the HTTP server binds to
bind = "127.0.0.1:8080"
# Shared secret for the /api/cron/check-feeds trigger
api_key = ""

[mailer]
# Transactional email HTTP API endpoint and key
api_url = "https://api.resend.com/emails"
api_key = ""
from = "Feedmail <noreply@feedmail.local>"

[retriever]
fetch_timeout_secs = 10
render_timeout_secs = 45
settle_ms = 3000
challenge_wait_ms = 5000
headless = true
max_concurrency = 5
"#;
