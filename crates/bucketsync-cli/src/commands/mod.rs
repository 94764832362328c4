//! CLI subcommands
//!
//! Each command owns its clap arguments and an `execute` method. Commands
//! that talk to the store share [`connect`] and [`validated`].

pub mod afew;
pub mod completions;
pub mod download;
pub mod list;
pub mod show;
pub mod upsync;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use bucketsync_core::config::{Config, ConfigBuilder};
use bucketsync_core::domain::newtypes::{BucketName, SyncPath};
use bucketsync_store::S3Session;

/// Validates a finished configuration, listing every problem at once
pub fn validated(builder: ConfigBuilder) -> Result<Config> {
    builder.build_validated().map_err(|errors| {
        let details: Vec<String> = errors.iter().map(ToString::to_string).collect();
        anyhow::anyhow!("Invalid configuration: {}", details.join("; "))
    })
}

/// Opens a verified session against the configured store
pub async fn connect(config: &Config) -> Result<Arc<S3Session>> {
    let session = S3Session::connect(&config.store)
        .await
        .context("Failed to connect to the object store")?;
    info!(region = %config.store.region, "Store session ready");
    Ok(Arc::new(session))
}

pub fn bucket_name(name: &str) -> Result<BucketName> {
    BucketName::new(name.to_string()).with_context(|| format!("Invalid bucket name '{name}'"))
}

/// Turns a user-supplied directory into an absolute [`SyncPath`]
pub fn absolute_dir(path: &Path) -> Result<SyncPath> {
    let absolute: PathBuf = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .context("Failed to get current directory")?
            .join(path)
    };
    SyncPath::new(absolute).context("Invalid directory path")
}

/// "file" or "files"
pub fn plural(count: usize, word: &str) -> String {
    if count == 1 {
        format!("{count} {word}")
    } else {
        format!("{count} {word}s")
    }
}
