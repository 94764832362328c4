//! Change detection between a local file and its remote counterpart
//!
//! Detection is two-step. [`ChangeDetector::precheck`] compares timestamps
//! only and never touches the disk. When timestamps disagree the caller
//! computes the local fingerprint and finishes with [`ChangeDetector::resolve`].
//! Hashing therefore only happens for files whose timestamp moved.

use chrono::{DateTime, Duration, FixedOffset, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::Fingerprint;
use super::objects::RemoteObject;

/// Legacy metadata timestamp layout (`2024-01-31 17:04:11 +0100`)
const LEGACY_MTIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";

/// What to do with one local file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    /// No remote object exists under this key
    Create,
    /// Content differs: upload the body with fresh metadata
    UpdateBody,
    /// Content identical but the stored mtime is stale: rewrite metadata only
    UpdateMetadataOnly,
    /// Timestamps agree: nothing to do
    Skip,
}

impl ChangeAction {
    /// Returns true if this action writes to the remote store
    pub fn is_mutation(&self) -> bool {
        !matches!(self, ChangeAction::Skip)
    }

    /// Returns true if this action counts as "updated" in the tally
    pub fn is_update(&self) -> bool {
        matches!(
            self,
            ChangeAction::UpdateBody | ChangeAction::UpdateMetadataOnly
        )
    }
}

impl std::fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeAction::Create => write!(f, "create"),
            ChangeAction::UpdateBody => write!(f, "update"),
            ChangeAction::UpdateMetadataOnly => write!(f, "update metadata"),
            ChangeAction::Skip => write!(f, "skip"),
        }
    }
}

/// Result of the timestamp-only pre-check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precheck {
    /// The action is known without reading the file
    Decided(ChangeAction),
    /// Timestamps disagree; the local fingerprint is required
    NeedsFingerprint,
}

/// Decides CREATE / UPDATE / SKIP for a local file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeDetector {
    epsilon: Duration,
}

impl ChangeDetector {
    /// Creates a detector with a custom timestamp tolerance
    pub fn with_epsilon(epsilon: Duration) -> Self {
        Self { epsilon }
    }

    /// Timestamp tolerance below which two mtimes compare equal
    pub fn epsilon(&self) -> Duration {
        self.epsilon
    }

    /// Compares the local mtime against the remote object's stored mtime
    ///
    /// A missing or unparseable stored mtime counts as a mismatch.
    pub fn precheck(&self, local_mtime: DateTime<Utc>, remote: Option<&RemoteObject>) -> Precheck {
        let Some(remote) = remote else {
            return Precheck::Decided(ChangeAction::Create);
        };

        match remote.stored_mtime() {
            Some(stored) if !self.differs(stored, local_mtime) => {
                Precheck::Decided(ChangeAction::Skip)
            }
            _ => Precheck::NeedsFingerprint,
        }
    }

    /// Finishes detection once the local fingerprint is known
    pub fn resolve(&self, local: &Fingerprint, remote: &RemoteObject) -> ChangeAction {
        if *local == remote.fingerprint {
            ChangeAction::UpdateMetadataOnly
        } else {
            ChangeAction::UpdateBody
        }
    }

    /// Returns true if two timestamps are further apart than epsilon
    pub fn differs(&self, a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
        (a - b).abs() > self.epsilon
    }
}

impl Default for ChangeDetector {
    fn default() -> Self {
        Self {
            epsilon: Duration::seconds(1),
        }
    }
}

/// Formats a modification time for the `mtime` metadata entry
pub fn format_mtime(mtime: DateTime<Utc>) -> String {
    mtime.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parses a stored `mtime` metadata value
///
/// Accepts RFC 3339 and the legacy `%Y-%m-%d %H:%M:%S %z` layout.
pub fn parse_mtime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::<FixedOffset>::parse_from_str(raw, LEGACY_MTIME_FORMAT))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
