pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "feedmail")]
#[command(about = "Watches web feeds and emails new posts", long_about = None)]
pub struct Cli {
    /// Configuration file path (defaults under the platform config directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server
    Serve {
        /// Bind address, overriding the configured one
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// Run one check pass over all subscriptions
    Check,
    /// Add a subscription
    Add {
        /// URL of the feed to watch
        feed_url: String,

        /// Display title for the blog
        #[arg(short, long)]
        title: Option<String>,

        /// Site page URL, used for feed discovery fallback
        #[arg(short, long)]
        site: Option<String>,

        /// Email address notifications go to
        #[arg(short, long)]
        email: String,
    },
    /// List subscriptions
    List,
    /// Remove a subscription
    Remove {
        /// URL of the feed to stop watching
        feed_url: String,
    },
}
