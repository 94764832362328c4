//! bucketsync CLI - Command-line interface for bucketsync
//!
//! Provides commands for:
//! - Uploading a local tree with change detection and retention
//! - Listing buckets and peeking at bucket contents
//! - Downloading a bucket or a single object
//! - Generating shell completions

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

use bucketsync_core::config::Config;

mod commands;
mod output;
mod prompt;

use commands::{
    afew::AfewCommand, completions::CompletionsCommand, download::DownloadCommand,
    list::ListCommand, show::ShowCommand, upsync::UpsyncCommand,
};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(
    name = "bucketsync",
    version,
    about = "Mirror a local directory into an S3 bucket, with backup retention"
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the store region
    #[arg(long, global = true)]
    region: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Upload changed files and optionally prune old backups
    Upsync(UpsyncCommand),
    /// List all buckets
    List(ListCommand),
    /// Show the first few keys in a bucket
    Afew(AfewCommand),
    /// Show the location of a bucket
    Show(ShowCommand),
    /// Download a whole bucket or a single object
    Download(DownloadCommand),
    /// Generate shell completions
    Completions(CompletionsCommand),
}

/// Log level for `-v` count; `configured` applies when there is none
fn verbosity_level(verbose: u8, configured: &str) -> &str {
    match verbose {
        0 => configured,
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup tracing; the filter is swapped once the config file is read
    let env_filter = EnvFilter::try_from_default_env().ok();
    let from_env = env_filter.is_some();
    let (filter, filter_handle) = reload::Layer::new(
        env_filter.unwrap_or_else(|| EnvFilter::new(verbosity_level(cli.verbose, "warn"))),
    );
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    let mut config = Config::resolve(cli.config.as_deref(), &cwd)?;
    config.merge_env_credentials(|name| std::env::var(name).ok());
    if let Some(region) = &cli.region {
        config.store.region = region.clone();
    }

    if !from_env && cli.verbose == 0 {
        filter_handle
            .reload(EnvFilter::new(&config.logging.level))
            .context("Failed to apply configured log level")?;
    }
    debug!(cwd = %cwd.display(), "Configuration resolved");

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    match cli.command {
        Commands::Upsync(cmd) => cmd.execute(config, format).await,
        Commands::List(cmd) => cmd.execute(&config, format).await,
        Commands::Afew(cmd) => cmd.execute(&config, format).await,
        Commands::Show(cmd) => cmd.execute(&config, format).await,
        Commands::Download(cmd) => cmd.execute(&config, format).await,
        Commands::Completions(cmd) => cmd.execute(format).await,
    }
}
