//! List command - Show every bucket visible to the credentials

use anyhow::{Context, Result};
use clap::Args;

use bucketsync_core::config::Config;
use bucketsync_core::ports::remote_store::IRemoteStore;

use crate::commands::connect;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct ListCommand {}

impl ListCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let store = connect(config).await?;

        let mut buckets = store
            .list_buckets()
            .await
            .context("Failed to list buckets")?;
        buckets.sort();

        if matches!(format, OutputFormat::Json) {
            formatter.print_json(&serde_json::json!({ "buckets": buckets }));
        } else if buckets.is_empty() {
            formatter.info("No buckets found.");
        } else {
            for bucket in &buckets {
                formatter.line(bucket);
            }
        }
        Ok(())
    }
}
