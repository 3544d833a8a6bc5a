use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use feedmail::app::AppContext;
use feedmail::cli::{commands, Cli, Commands};
use feedmail::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = match cli.config {
        Some(ref path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let ctx = AppContext::new(config)?;

    match cli.command {
        Commands::Serve { bind } => {
            commands::serve(ctx, bind).await?;
        }
        Commands::Check => {
            commands::check(&ctx).await?;
        }
        Commands::Add {
            feed_url,
            title,
            site,
            email,
        } => {
            commands::add_subscription(&ctx, &feed_url, title, site, &email).await?;
        }
        Commands::List => {
            commands::list_subscriptions(&ctx)?;
        }
        Commands::Remove { feed_url } => {
            commands::remove_subscription(&ctx, &feed_url)?;
        }
    }

    Ok(())
}
