//! CLI entry point.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use crate::auth;
use crate::config::Config;
use crate::fetcher::RateLimitedFetcher;
use crate::search::SearchJob;

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("tweetvault/", env!("CARGO_PKG_VERSION"));

/// Request timeout for token and search requests.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "tweetvault")]
#[command(about = "Rate-limited full-archive search acquisition tool")]
#[command(version)]
pub struct Cli {
    /// Configuration file
    #[arg(short, long, env = "TWEETVAULT_CONFIG")]
    pub config: PathBuf,

    /// Override the configured output directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Run a full archive sweep with the given configuration.
pub async fn run(cli: Cli, config: Config) -> anyhow::Result<()> {
    let output_dir = cli.output.unwrap_or_else(|| config.output_dir());

    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .gzip(true)
        .brotli(true)
        .build()
        .context("failed to create HTTP client")?;

    info!("Getting bearer token...");
    let token = auth::get_bearer_token(
        &client,
        &config.token_url,
        &config.api_key,
        &config.api_secret,
    )
    .await?;

    let fetcher = RateLimitedFetcher::new(client, config.requests_per_hour);
    let params = config.query_pairs()?;
    let mut job = SearchJob::new(
        fetcher,
        config.search_url.clone(),
        params,
        &token,
        output_dir,
    )?;

    let pages = job.run().await?;
    info!("Archive complete: {} page(s) written", pages);
    Ok(())
}
