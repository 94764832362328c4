//! Domain error types
//!
//! This module defines error types specific to domain operations:
//! validation failures for keys, bucket names, fingerprints, globs and paths.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid path format or content
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Path is not within the configured sync root
    #[error("Path not within sync root: {0}")]
    PathNotInSyncRoot(String),

    /// Invalid object key
    #[error("Invalid object key: {0}")]
    InvalidObjectKey(String),

    /// Invalid bucket name
    #[error("Invalid bucket name: {0}")]
    InvalidBucketName(String),

    /// Invalid fingerprint format (expected hex MD5 or multipart ETag)
    #[error("Invalid fingerprint: {0}")]
    InvalidFingerprint(String),

    /// Glob pattern failed to compile
    #[error("Invalid glob pattern '{pattern}': {reason}")]
    InvalidGlob { pattern: String, reason: String },

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
