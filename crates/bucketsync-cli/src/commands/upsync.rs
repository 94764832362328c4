//! Upsync command - Upload a local tree into a bucket
//!
//! Provides the `bucketsync upsync <BUCKET> <DIRECTORY>` CLI command which:
//! 1. Merges command-line flags over the configuration file
//! 2. Connects to the store and verifies the credentials
//! 3. Plans the run and shows the candidate count
//! 4. Asks for confirmation (unless `--noprompt` or `--dry-run`)
//! 5. Runs the SyncEngine and prints the tally

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Args;
use tracing::info;

use bucketsync_core::config::{Config, ConfigBuilder};
use bucketsync_sync::engine::{SyncEngine, SyncOutcome, UpsyncOptions};
use bucketsync_sync::filesystem::LocalEnumerator;

use crate::commands::{absolute_dir, bucket_name, connect, plural, validated};
use crate::output::{get_formatter, OutputFormat};
use crate::prompt::StdinConfirmation;

/// Upsync command with clap options
#[derive(Debug, Args)]
pub struct UpsyncCommand {
    /// Target bucket
    pub bucket: String,

    /// Local directory to mirror
    pub directory: PathBuf,

    /// Glob matched against paths relative to DIRECTORY
    #[arg(long)]
    pub glob: Option<String>,

    /// Upload objects with the public-read ACL
    #[arg(long)]
    pub public: bool,

    /// Do not ask for confirmation
    #[arg(long = "noprompt")]
    pub no_prompt: bool,

    /// Keep daily/weekly/monthly snapshots and delete the rest remotely
    #[arg(long)]
    pub backups_retain: bool,

    /// Number of daily snapshots to keep
    #[arg(long)]
    pub days_retain: Option<u32>,

    /// Number of weekly snapshots to keep
    #[arg(long)]
    pub weeks_retain: Option<u32>,

    /// Number of monthly snapshots to keep
    #[arg(long)]
    pub months_retain: Option<u32>,

    /// Show what would be done without making changes
    #[arg(long)]
    pub dry_run: bool,

    /// Maximum concurrent store operations
    #[arg(long)]
    pub concurrency: Option<usize>,
}

impl UpsyncCommand {
    /// Layers the command-line flags over the file configuration
    fn effective_config(&self, config: Config) -> Result<Config> {
        let upsync = &config.upsync;
        let glob = self.glob.clone().unwrap_or_else(|| upsync.glob.clone());
        let days = self.days_retain.unwrap_or(upsync.days_retain);
        let weeks = self.weeks_retain.unwrap_or(upsync.weeks_retain);
        let months = self.months_retain.unwrap_or(upsync.months_retain);
        let concurrency = self.concurrency.unwrap_or(upsync.concurrency);
        let public = self.public || upsync.public;
        let no_prompt = self.no_prompt || upsync.no_prompt;
        let backups_retain = self.backups_retain || upsync.backups_retain;
        let dry_run = self.dry_run || upsync.dry_run;

        validated(
            ConfigBuilder::from_config(config)
                .upsync_glob(glob)
                .upsync_public(public)
                .upsync_no_prompt(no_prompt)
                .upsync_backups_retain(backups_retain)
                .upsync_retention(days, weeks, months)
                .upsync_dry_run(dry_run)
                .upsync_concurrency(concurrency),
        )
    }

    /// Execute the upsync command
    pub async fn execute(&self, config: Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let config = self.effective_config(config)?;
        let options = UpsyncOptions::from(&config.upsync);
        let bucket = bucket_name(&self.bucket)?;
        let root = absolute_dir(&self.directory)?;

        if options.dry_run {
            formatter.info("This is a dry run.");
        }

        let store = connect(&config).await?;
        let engine = SyncEngine::new(
            store,
            Arc::new(LocalEnumerator::new()),
            Arc::new(StdinConfirmation),
        );

        let plan = engine
            .plan(&bucket, &root, options, &Local::now())
            .await
            .context("Failed to prepare upsync")?;
        info!(candidates = plan.candidates(), filtered = plan.filtered_out(), "Upsync planned");
        formatter.info(&format!(
            "Found {} candidate file upload(s).",
            plan.candidates()
        ));
        let dry_run = plan.is_dry_run();

        let outcome = engine.run_plan(plan).await.context("Upsync failed")?;

        match outcome {
            SyncOutcome::Completed(tally) => {
                if matches!(format, OutputFormat::Json) {
                    formatter.print_json(&serde_json::json!({
                        "bucket": bucket.as_str(),
                        "dry_run": dry_run,
                        "created": tally.created,
                        "updated": tally.updated,
                        "skipped": tally.skipped,
                        "deleted": tally.deleted,
                        "retained": tally.retained,
                        "failures": tally.failures,
                    }));
                } else {
                    formatter.success(&format!("Done. {}", tally.report_line()));
                    for failure in &tally.failures {
                        formatter.warn(&format!("{}: {}", failure.key, failure.message));
                    }
                }
                if tally.has_failures() {
                    anyhow::bail!("{} failed", plural(tally.failures.len(), "item"));
                }
            }
            SyncOutcome::Declined => formatter.info("No action taken."),
            SyncOutcome::NothingToUpload => formatter.info("No files to upload."),
        }

        Ok(())
    }
}
