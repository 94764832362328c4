//! Per-run counters and the summary report line

use serde::{Deserialize, Serialize};

use super::change::ChangeAction;

/// A file or object whose processing failed without aborting the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncFailure {
    /// Object key (or relative path) that failed
    pub key: String,
    /// Human-readable error message
    pub message: String,
}

/// Counters accumulated over one sync run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncTally {
    pub created: u64,
    pub updated: u64,
    pub skipped: u64,
    pub deleted: u64,
    pub retained: u64,
    pub failures: Vec<SyncFailure>,
}

impl SyncTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one change-detector outcome
    pub fn record(&mut self, action: ChangeAction) {
        match action {
            ChangeAction::Create => self.created += 1,
            ChangeAction::UpdateBody | ChangeAction::UpdateMetadataOnly => self.updated += 1,
            ChangeAction::Skip => self.skipped += 1,
        }
    }

    pub fn record_failure(&mut self, key: impl Into<String>, message: impl Into<String>) {
        self.failures.push(SyncFailure {
            key: key.into(),
            message: message.into(),
        });
    }

    /// Returns true if any file or object failed
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// `"<c> created. <u> updated. <s> local skipped. <d> deleted remotely. <r> retained remotely."`
    pub fn report_line(&self) -> String {
        format!(
            "{} created. {} updated. {} local skipped. {} deleted remotely. {} retained remotely.",
            self.created, self.updated, self.skipped, self.deleted, self.retained
        )
    }
}

impl std::fmt::Display for SyncTally {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.report_line())
    }
}
