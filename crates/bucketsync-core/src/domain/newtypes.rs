//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for domain identifiers and values.
//! Each newtype ensures data validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

// ============================================================================
// Path types
// ============================================================================

/// A validated absolute path on the local filesystem
///
/// SyncPath ensures the path is:
/// - Absolute (starts with /)
/// - Normalized (no . or .. components)
/// - Within the sync root when validated against one
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "PathBuf", into = "PathBuf")]
pub struct SyncPath(PathBuf);

impl SyncPath {
    /// Create a new SyncPath, validating it is absolute
    ///
    /// # Errors
    /// Returns `DomainError::InvalidPath` if the path is not absolute
    pub fn new(path: PathBuf) -> Result<Self, DomainError> {
        if !path.is_absolute() {
            return Err(DomainError::InvalidPath(format!(
                "Path must be absolute: {}",
                path.display()
            )));
        }

        // We don't use fs::canonicalize() as the path might not exist yet
        let normalized = Self::normalize_path(&path)?;
        Ok(Self(normalized))
    }

    /// Create a SyncPath validated against a sync root
    ///
    /// # Errors
    /// Returns error if path is not within the sync root
    fn new_within_root(path: PathBuf, sync_root: &SyncPath) -> Result<Self, DomainError> {
        let sync_path = Self::new(path)?;

        if !sync_path.0.starts_with(&sync_root.0) {
            return Err(DomainError::PathNotInSyncRoot(format!(
                "{} is not within sync root {}",
                sync_path.0.display(),
                sync_root.0.display()
            )));
        }

        Ok(sync_path)
    }

    /// Get the inner path reference
    #[must_use]
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Convert to owned PathBuf
    #[must_use]
    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }

    /// Get the path relative to a root
    ///
    /// # Errors
    /// Returns error if this path is not within the root
    pub fn relative_to(&self, root: &SyncPath) -> Result<PathBuf, DomainError> {
        self.0
            .strip_prefix(&root.0)
            .map(|p| p.to_path_buf())
            .map_err(|_| {
                DomainError::PathNotInSyncRoot(format!(
                    "{} is not within {}",
                    self.0.display(),
                    root.0.display()
                ))
            })
    }

    /// Join a relative object key (`a/b/c.txt`) onto this path
    ///
    /// # Errors
    /// Returns error if the key would escape this directory
    pub fn join_key(&self, key: &ObjectKey) -> Result<Self, DomainError> {
        let mut joined = self.0.clone();
        for segment in key.as_str().split('/') {
            if segment == ".." {
                return Err(DomainError::InvalidPath(format!(
                    "Object key escapes target directory: {key}"
                )));
            }
            joined.push(segment);
        }
        Self::new_within_root(joined, self)
    }

    /// Normalize a path by resolving . and .. components
    fn normalize_path(path: &Path) -> Result<PathBuf, DomainError> {
        use std::path::Component;

        let mut normalized = PathBuf::new();

        for component in path.components() {
            match component {
                Component::Prefix(p) => normalized.push(p.as_os_str()),
                Component::RootDir => normalized.push("/"),
                Component::CurDir => {}
                Component::ParentDir => {
                    if !normalized.pop() {
                        return Err(DomainError::InvalidPath(
                            "Path escapes root via ..".to_string(),
                        ));
                    }
                }
                Component::Normal(c) => normalized.push(c),
            }
        }

        Ok(normalized)
    }
}

impl Display for SyncPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl TryFrom<PathBuf> for SyncPath {
    type Error = DomainError;

    fn try_from(path: PathBuf) -> Result<Self, Self::Error> {
        Self::new(path)
    }
}

impl From<SyncPath> for PathBuf {
    fn from(sync_path: SyncPath) -> Self {
        sync_path.0
    }
}

impl AsRef<Path> for SyncPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

// ============================================================================
// Object store types
// ============================================================================

/// Key of an object inside a bucket
///
/// Keys are the local path relative to the sync root, `/`-separated,
/// e.g. `"backups/db-2024-01-01.sql.gz"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Maximum key length accepted by S3
    const MAX_LEN: usize = 1024;

    /// Create a new ObjectKey
    ///
    /// # Errors
    /// Returns error if the key is empty, too long, or starts with `/`
    pub fn new(key: String) -> Result<Self, DomainError> {
        if key.is_empty() {
            return Err(DomainError::InvalidObjectKey(
                "Object key cannot be empty".to_string(),
            ));
        }
        if key.len() > Self::MAX_LEN {
            return Err(DomainError::InvalidObjectKey(format!(
                "Object key longer than {} bytes: {key}",
                Self::MAX_LEN
            )));
        }
        if key.starts_with('/') {
            return Err(DomainError::InvalidObjectKey(format!(
                "Object key must be relative: {key}"
            )));
        }

        Ok(Self(key))
    }

    /// Build a key from a path relative to the sync root
    ///
    /// # Errors
    /// Returns error if the path has non-UTF-8 or non-normal components
    pub fn from_relative_path(relative: &Path) -> Result<Self, DomainError> {
        use std::path::Component;

        let mut segments = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(c) => {
                    let segment = c.to_str().ok_or_else(|| {
                        DomainError::InvalidObjectKey(format!(
                            "Path is not valid UTF-8: {}",
                            relative.display()
                        ))
                    })?;
                    segments.push(segment);
                }
                Component::CurDir => {}
                _ => {
                    return Err(DomainError::InvalidObjectKey(format!(
                        "Path is not relative to the sync root: {}",
                        relative.display()
                    )))
                }
            }
        }

        Self::new(segments.join("/"))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ObjectKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ObjectKey {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for ObjectKey {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ObjectKey> for String {
    fn from(key: ObjectKey) -> Self {
        key.0
    }
}

/// Name of a bucket in the remote store
///
/// Follows the S3 naming rules: 3-63 characters of lowercase letters,
/// digits, `.` and `-`, starting and ending with a letter or digit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BucketName(String);

impl BucketName {
    /// Create a new BucketName
    ///
    /// # Errors
    /// Returns error if the name violates the bucket naming rules
    pub fn new(name: String) -> Result<Self, DomainError> {
        if !(3..=63).contains(&name.len()) {
            return Err(DomainError::InvalidBucketName(format!(
                "Bucket name must be 3-63 characters: {name}"
            )));
        }

        if !name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-')
        {
            return Err(DomainError::InvalidBucketName(format!(
                "Bucket name contains invalid characters: {name}"
            )));
        }

        let edge_ok = |c: Option<char>| c.is_some_and(|c| c.is_ascii_alphanumeric());
        if !edge_ok(name.chars().next()) || !edge_ok(name.chars().last()) {
            return Err(DomainError::InvalidBucketName(format!(
                "Bucket name must start and end with a letter or digit: {name}"
            )));
        }

        Ok(Self(name))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for BucketName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BucketName {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for BucketName {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<BucketName> for String {
    fn from(name: BucketName) -> Self {
        name.0
    }
}

/// Content fingerprint of an object (MD5 in lowercase hex)
///
/// For single-part uploads S3 reports the MD5 of the body as the ETag.
/// Multipart ETags (`<hex>-<parts>`) are accepted but never equal a local
/// MD5, so such objects are always treated as changed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Hex length of an MD5 digest
    const MD5_HEX_LEN: usize = 32;

    /// Create a new Fingerprint from a hex digest
    ///
    /// # Errors
    /// Returns error if the value is not a hex MD5 or multipart ETag
    pub fn new(hex: String) -> Result<Self, DomainError> {
        let hex = hex.to_ascii_lowercase();
        let (digest, parts) = match hex.split_once('-') {
            Some((digest, parts)) => (digest, Some(parts)),
            None => (hex.as_str(), None),
        };

        if digest.len() != Self::MD5_HEX_LEN || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(DomainError::InvalidFingerprint(format!(
                "Expected {} hex characters: {hex}",
                Self::MD5_HEX_LEN
            )));
        }

        if let Some(parts) = parts {
            if parts.is_empty() || !parts.chars().all(|c| c.is_ascii_digit()) {
                return Err(DomainError::InvalidFingerprint(format!(
                    "Malformed multipart suffix: {hex}"
                )));
            }
        }

        Ok(Self(hex))
    }

    /// Create a Fingerprint from an ETag header value (`"d41d8cd9..."`)
    ///
    /// # Errors
    /// Returns error if the unquoted value is not a valid fingerprint
    pub fn from_etag(etag: &str) -> Result<Self, DomainError> {
        let trimmed = etag.trim();
        let unquoted = trimmed
            .strip_prefix("W/")
            .unwrap_or(trimmed)
            .trim_matches('"');
        Self::new(unquoted.to_string())
    }

    /// Create a Fingerprint from raw MD5 digest bytes
    #[must_use]
    pub fn from_digest(digest: [u8; 16]) -> Self {
        Self(digest.iter().map(|byte| format!("{byte:02x}")).collect())
    }

    /// Returns true if this is a multipart-upload ETag rather than a plain MD5
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.0.contains('-')
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Fingerprint {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Fingerprint> for String {
    fn from(fp: Fingerprint) -> Self {
        fp.0
    }
}

// ============================================================================
// Tests
// ============================================================================
