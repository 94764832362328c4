//! Glob filter over object keys
//!
//! The same filter selects local files for upload and remote objects for
//! deletion, so both phases agree on what "matches the glob" means.
//! Matching rules:
//! - `*` and `?` never cross a `/`; `**` spans directories
//! - dot-files and dot-directories only match when the dot is literal
//! - case-sensitive

use glob::{MatchOptions, Pattern};
use tracing::trace;

use super::errors::DomainError;
use super::newtypes::ObjectKey;

/// Compiled glob matched against `/`-separated keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobFilter {
    pattern: Pattern,
}

impl GlobFilter {
    /// Options shared by every match
    pub const OPTIONS: MatchOptions = MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: true,
    };

    /// Compiles `pattern`
    ///
    /// # Errors
    /// Returns `DomainError::InvalidGlob` if the pattern is malformed
    pub fn new(pattern: &str) -> Result<Self, DomainError> {
        let pattern = Pattern::new(pattern).map_err(|e| DomainError::InvalidGlob {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { pattern })
    }

    /// The pattern as written
    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }

    /// Returns true if `key` matches
    pub fn matches(&self, key: &ObjectKey) -> bool {
        self.matches_str(key.as_str())
    }

    /// Returns true if the relative path `path` matches
    pub fn matches_str(&self, path: &str) -> bool {
        let matched = self.pattern.matches_with(path, Self::OPTIONS);
        trace!(path, pattern = %self.pattern, matched, "Glob evaluated");
        matched
    }
}

impl Default for GlobFilter {
    /// `**/*`: every non-hidden file
    fn default() -> Self {
        Self {
            pattern: Pattern::new("**/*").unwrap_or_default(),
        }
    }
}
