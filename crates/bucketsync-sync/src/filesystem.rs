//! Local filesystem adapter (secondary/driven adapter)
//!
//! Implements [`ILocalEnumerator`] using `tokio::fs` for async file operations.
//!
//! ## Design Decisions
//!
//! - **Walk then filter**: the tree is walked in full and each relative path
//!   is tested with the same [`GlobFilter`] the deletion phase uses.
//! - **Symlinks**: symlinked files are followed, symlinked directories are
//!   not descended into (no cycles).
//! - **MD5 fingerprint**: streamed in chunks of at most 40 MiB so that large
//!   backups never sit in memory whole. Matches S3's single-part ETag.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use tokio::io::AsyncReadExt;
use tracing::{debug, instrument, trace};

use bucketsync_core::{
    domain::{
        filter::GlobFilter,
        newtypes::{Fingerprint, ObjectKey, SyncPath},
        objects::LocalFile,
    },
    ports::local_enumerator::ILocalEnumerator,
};

/// Largest single read while fingerprinting
pub const FINGERPRINT_CHUNK_SIZE: usize = 40 * 1024 * 1024;

// ============================================================================
// LocalEnumerator struct
// ============================================================================

/// Adapter that bridges the [`ILocalEnumerator`] port to the real filesystem.
///
/// Zero-sized; the sync root and glob arrive with each call.
#[derive(Debug, Clone, Default)]
pub struct LocalEnumerator;

impl LocalEnumerator {
    /// Create a new `LocalEnumerator`.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Recursively collects regular files below `root`
    async fn walk(root: &Path) -> anyhow::Result<Vec<(PathBuf, std::fs::Metadata)>> {
        let mut files = Vec::new();
        let mut pending = vec![root.to_path_buf()];

        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir)
                .await
                .with_context(|| format!("failed to read directory {}", dir.display()))?;

            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let file_type = entry.file_type().await?;

                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file() {
                    let metadata = entry.metadata().await?;
                    files.push((path, metadata));
                } else if file_type.is_symlink() {
                    match tokio::fs::metadata(&path).await {
                        Ok(metadata) if metadata.is_file() => files.push((path, metadata)),
                        Ok(_) => trace!(path = %path.display(), "Not following directory symlink"),
                        Err(e) => debug!(path = %path.display(), error = %e, "Dangling symlink"),
                    }
                }
            }
        }

        Ok(files)
    }
}

// ============================================================================
// ILocalEnumerator implementation
// ============================================================================

#[async_trait::async_trait]
impl ILocalEnumerator for LocalEnumerator {
    #[instrument(skip(self, filter), fields(root = %root, glob = filter.as_str()))]
    async fn enumerate(
        &self,
        root: &SyncPath,
        filter: &GlobFilter,
    ) -> anyhow::Result<Vec<LocalFile>> {
        let walked = Self::walk(root.as_path()).await?;
        let total = walked.len();

        let mut files = Vec::new();
        for (path, metadata) in walked {
            let relative = SyncPath::new(path.clone())
                .and_then(|p| p.relative_to(root))
                .with_context(|| format!("{} escaped the sync root", path.display()))?;
            let key = match ObjectKey::from_relative_path(&relative) {
                Ok(key) => key,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "Skipping file without a valid key");
                    continue;
                }
            };
            if !filter.matches(&key) {
                continue;
            }

            let modified: DateTime<Utc> = metadata
                .modified()
                .with_context(|| format!("no modification time for {}", path.display()))?
                .into();

            files.push(LocalFile {
                key,
                path,
                modified,
                size: metadata.len(),
            });
        }

        files.sort_by(|a, b| a.key.cmp(&b.key));
        debug!(walked = total, matched = files.len(), "enumeration complete");
        Ok(files)
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn fingerprint(&self, path: &Path) -> anyhow::Result<Fingerprint> {
        let mut file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("failed to open {}", path.display()))?;
        let len = file.metadata().await?.len();

        let chunk = usize::try_from(len)
            .unwrap_or(FINGERPRINT_CHUNK_SIZE)
            .clamp(1, FINGERPRINT_CHUNK_SIZE);
        let mut buffer = vec![0u8; chunk];
        let mut ctx = md5::Context::new();
        let mut read_total = 0u64;

        loop {
            let n = file
                .read(&mut buffer)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            if n == 0 {
                break;
            }
            ctx.consume(&buffer[..n]);
            read_total += n as u64;
        }

        let fingerprint = Fingerprint::from_digest(ctx.compute().0);
        debug!(bytes = read_total, %fingerprint, "fingerprint computed");
        Ok(fingerprint)
    }
}

// ============================================================================
// Tests
// ============================================================================
