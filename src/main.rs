//! TweetVault - rate-limited full-archive search acquisition tool.

use std::fs::File;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tweetvault::cli::{self, Cli};
use tweetvault::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (before anything else)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = Config::load(&cli.config).await?;

    // The file layer depends on the loaded configuration, so logging setup
    // happens after the config read.
    let default_filter = if cli.verbose {
        "tweetvault=debug"
    } else {
        "tweetvault=info"
    };

    let file_layer = open_log_file(&config)?.map(|file| {
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file)
    });

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    cli::run(cli, config).await
}

/// Open a timestamped log file when file logging is configured.
fn open_log_file(config: &Config) -> anyhow::Result<Option<Arc<File>>> {
    let Some(log_dir) = config.log_dir() else {
        return Ok(None);
    };

    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create log directory '{}'", log_dir.display()))?;

    let filename = format!("{}_tweetvault.log", chrono::Utc::now().timestamp());
    let path = log_dir.join(filename);
    let file = File::create(&path)
        .with_context(|| format!("failed to create log file '{}'", path.display()))?;
    Ok(Some(Arc::new(file)))
}
