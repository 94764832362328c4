//! Afew command - Peek at the first keys in a bucket

use anyhow::{Context, Result};
use clap::Args;

use bucketsync_core::config::Config;
use bucketsync_core::domain::objects::ObjectSummary;
use bucketsync_core::ports::remote_store::IRemoteStore;

use crate::commands::{bucket_name, connect};
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct AfewCommand {
    /// Bucket to peek into
    pub bucket: String,

    /// How many keys to show
    #[arg(long, default_value_t = 5)]
    pub count: usize,
}

/// First `count` objects in key order
fn first_few(mut objects: Vec<ObjectSummary>, count: usize) -> Vec<ObjectSummary> {
    objects.sort_by(|a, b| a.key.cmp(&b.key));
    objects.truncate(count);
    objects
}

impl AfewCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let bucket = bucket_name(&self.bucket)?;
        let store = connect(config).await?;

        let objects = store
            .list_objects(&bucket)
            .await
            .with_context(|| format!("Failed to list objects in {bucket}"))?;
        let few = first_few(objects, self.count);

        if matches!(format, OutputFormat::Json) {
            let items: Vec<serde_json::Value> = few
                .iter()
                .map(|o| {
                    serde_json::json!({
                        "key": o.key.as_str(),
                        "size": o.size,
                        "last_modified": o.last_modified.to_rfc3339(),
                        "etag": o.fingerprint.as_str(),
                    })
                })
                .collect();
            formatter.print_json(&serde_json::json!({ "bucket": bucket.as_str(), "objects": items }));
        } else if few.is_empty() {
            formatter.info("Bucket is empty.");
        } else {
            for object in &few {
                formatter.line(object.key.as_str());
            }
        }
        Ok(())
    }
}
