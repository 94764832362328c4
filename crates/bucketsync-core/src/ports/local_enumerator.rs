//! Local file enumeration port (driven/secondary port)
//!
//! Lists the regular files under a sync root that match a glob and computes
//! their content fingerprints.
//!
//! Uses `anyhow::Result` because filesystem errors are adapter-specific;
//! the engine records them per file rather than classifying them.

use std::path::Path;

use crate::domain::filter::GlobFilter;
use crate::domain::newtypes::{Fingerprint, SyncPath};
use crate::domain::objects::LocalFile;

/// Port trait for local file enumeration and fingerprinting
#[async_trait::async_trait]
pub trait ILocalEnumerator: Send + Sync {
    /// Returns every regular file under `root` whose relative path matches `filter`
    ///
    /// Results are sorted by key. Directories are never returned.
    async fn enumerate(
        &self,
        root: &SyncPath,
        filter: &GlobFilter,
    ) -> anyhow::Result<Vec<LocalFile>>;

    /// Computes the MD5 fingerprint of a file, streaming its contents
    async fn fingerprint(&self, path: &Path) -> anyhow::Result<Fingerprint>;
}
