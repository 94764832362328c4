//! Local files and remote objects as seen by one sync run
//!
//! These values are ephemeral: they are produced by the enumerator and the
//! remote store at the start of each phase and discarded when the run ends.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::change::parse_mtime;
use super::newtypes::{Fingerprint, ObjectKey};

/// User metadata attached to a remote object
///
/// Keys are stored without the `x-amz-meta-` prefix.
pub type ObjectMetadata = BTreeMap<String, String>;

/// Reserved metadata key carrying the local modification time
pub const MTIME_METADATA_KEY: &str = "mtime";

/// A regular file found under the sync root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    /// Path relative to the sync root, used as the remote key
    pub key: ObjectKey,
    /// Absolute path on disk
    pub path: PathBuf,
    /// Last modification time (sub-second precision)
    pub modified: DateTime<Utc>,
    /// Size in bytes
    pub size: u64,
}

/// An entry from a bucket listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSummary {
    pub key: ObjectKey,
    pub fingerprint: Fingerprint,
    pub last_modified: DateTime<Utc>,
    pub size: u64,
}

/// Full metadata of a single remote object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteObject {
    /// Object key
    pub key: ObjectKey,
    /// Normalised ETag
    pub fingerprint: Fingerprint,
    /// User metadata (the `mtime` entry lives here)
    pub metadata: ObjectMetadata,
    /// Store-assigned last-modified timestamp
    pub last_modified: DateTime<Utc>,
    /// Size in bytes
    pub size: u64,
}

impl RemoteObject {
    /// Modification time recorded by a previous upload, if present and parseable
    pub fn stored_mtime(&self) -> Option<DateTime<Utc>> {
        self.metadata
            .get(MTIME_METADATA_KEY)
            .and_then(|raw| parse_mtime(raw))
    }

    /// Timestamp used for retention: the stored mtime, else the store's last-modified
    pub fn effective_timestamp(&self) -> DateTime<Utc> {
        self.stored_mtime().unwrap_or(self.last_modified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn remote(metadata: ObjectMetadata) -> RemoteObject {
        RemoteObject {
            key: ObjectKey::new("a.txt".to_string()).unwrap(),
            fingerprint: Fingerprint::new("d41d8cd98f00b204e9800998ecf8427e".to_string()).unwrap(),
            metadata,
            last_modified: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            size: 0,
        }
    }

    #[test]
    fn test_effective_timestamp_prefers_stored_mtime() {
        let mut metadata = ObjectMetadata::new();
        metadata.insert(
            MTIME_METADATA_KEY.to_string(),
            "2024-02-01T08:30:00Z".to_string(),
        );
        let obj = remote(metadata);

        let expected = Utc.with_ymd_and_hms(2024, 2, 1, 8, 30, 0).unwrap();
        assert_eq!(obj.stored_mtime(), Some(expected));
        assert_eq!(obj.effective_timestamp(), expected);
    }

    #[test]
    fn test_effective_timestamp_falls_back_to_last_modified() {
        let obj = remote(ObjectMetadata::new());
        assert_eq!(obj.stored_mtime(), None);
        assert_eq!(obj.effective_timestamp(), obj.last_modified);
    }

    #[test]
    fn test_unparseable_mtime_falls_back() {
        let mut metadata = ObjectMetadata::new();
        metadata.insert(MTIME_METADATA_KEY.to_string(), "yesterday".to_string());
        let obj = remote(metadata);
        assert_eq!(obj.effective_timestamp(), obj.last_modified);
    }
}
