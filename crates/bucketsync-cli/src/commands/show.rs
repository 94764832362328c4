//! Show command - Print where a bucket lives

use anyhow::{Context, Result};
use clap::Args;

use bucketsync_core::config::Config;
use bucketsync_core::domain::newtypes::BucketName;
use bucketsync_core::ports::remote_store::IRemoteStore;

use crate::commands::{bucket_name, connect};
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct ShowCommand {
    /// Bucket to describe
    pub bucket: Option<String>,
}

async fn location_of(store: &dyn IRemoteStore, bucket: &BucketName) -> Result<String> {
    store
        .bucket_location(bucket)
        .await
        .with_context(|| format!("Failed to look up {bucket}"))
}

impl ShowCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let Some(name) = &self.bucket else {
            formatter.info("No bucket name given.");
            return Ok(());
        };
        let bucket = bucket_name(name)?;
        let store = connect(config).await?;
        let location = location_of(&*store, &bucket).await?;

        if matches!(format, OutputFormat::Json) {
            formatter.print_json(&serde_json::json!({
                "bucket": bucket.as_str(),
                "location": location,
            }));
        } else {
            formatter.line(&format!("{bucket}: {location}"));
        }
        Ok(())
    }
}
