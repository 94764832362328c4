//! Download command - Copy a bucket (or one object) to local disk
//!
//! Keys map to paths below the target directory; parent directories are
//! created as needed. Keys that would escape the target are refused.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use futures_util::stream::{self, StreamExt};
use tracing::{info, warn};

use bucketsync_core::config::Config;
use bucketsync_core::domain::newtypes::{BucketName, ObjectKey, SyncPath};
use bucketsync_core::ports::confirmation::IConfirmation;
use bucketsync_core::ports::remote_store::IRemoteStore;

use crate::commands::{absolute_dir, bucket_name, connect, plural};
use crate::output::{get_formatter, OutputFormat};
use crate::prompt::StdinConfirmation;

#[derive(Debug, Args)]
pub struct DownloadCommand {
    /// Bucket to download from
    pub bucket: String,

    /// Download only this key
    #[arg(long)]
    pub one: Option<String>,

    /// Target directory (defaults to the current directory)
    #[arg(long)]
    pub into: Option<PathBuf>,

    /// Do not ask for confirmation
    #[arg(long = "noprompt")]
    pub no_prompt: bool,
}

/// Downloads `key` to its place below `dest`
async fn download_one(
    store: &dyn IRemoteStore,
    bucket: &BucketName,
    key: &ObjectKey,
    dest: &SyncPath,
) -> Result<PathBuf> {
    let target = dest.join_key(key)?;
    store
        .download_object(bucket, key, target.as_path())
        .await
        .with_context(|| format!("Failed to download {key}"))?;
    Ok(target.into_path_buf())
}

/// Downloads every key with at most `concurrency` transfers in flight
async fn download_all(
    store: &dyn IRemoteStore,
    bucket: &BucketName,
    keys: Vec<ObjectKey>,
    dest: &SyncPath,
    concurrency: usize,
) -> Vec<(ObjectKey, Result<PathBuf>)> {
    stream::iter(keys)
        .map(|key| async move {
            let result = download_one(store, bucket, &key, dest).await;
            (key, result)
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await
}

impl DownloadCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let bucket = bucket_name(&self.bucket)?;
        let dest = absolute_dir(self.into.as_deref().unwrap_or_else(|| Path::new(".")))?;
        let store = connect(config).await?;

        if let Some(one) = &self.one {
            let key = ObjectKey::new(one.clone()).context("Invalid object key")?;
            let path = download_one(&*store, &bucket, &key, &dest).await?;
            formatter.success(&format!("Downloaded {} to {}", key, path.display()));
            return Ok(());
        }

        let keys: Vec<ObjectKey> = store
            .list_objects(&bucket)
            .await
            .with_context(|| format!("Failed to list objects in {bucket}"))?
            .into_iter()
            .map(|o| o.key)
            .collect();
        if keys.is_empty() {
            formatter.info("Bucket is empty.");
            return Ok(());
        }

        formatter.info(&format!("Found {}.", plural(keys.len(), "object")));
        if !self.no_prompt {
            let question = format!(
                "Download {} into {}?",
                plural(keys.len(), "object"),
                dest
            );
            if !StdinConfirmation.confirm(&question).await? {
                formatter.info("No action taken.");
                return Ok(());
            }
        }

        let total = keys.len();
        let results = download_all(
            &*store,
            &bucket,
            keys,
            &dest,
            config.upsync.concurrency,
        )
        .await;

        let mut failed = 0usize;
        for (key, result) in &results {
            match result {
                Ok(path) => info!(%key, path = %path.display(), "Downloaded"),
                Err(e) => {
                    failed += 1;
                    warn!(%key, error = %e, "Download failed");
                    formatter.warn(&format!("{key}: {e:#}"));
                }
            }
        }

        if matches!(format, OutputFormat::Json) {
            formatter.print_json(&serde_json::json!({
                "bucket": bucket.as_str(),
                "into": dest.to_string(),
                "downloaded": total - failed,
                "failed": failed,
            }));
        } else {
            formatter.success(&format!(
                "Done. {} downloaded into {}.",
                plural(total - failed, "object"),
                dest
            ));
        }

        if failed > 0 {
            anyhow::bail!("{} failed to download", plural(failed, "object"));
        }
        Ok(())
    }
}
