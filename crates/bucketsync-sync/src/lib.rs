//! bucketsync Sync - Upload and retention engine
//!
//! Provides:
//! - One-way upload of a local tree into a bucket
//! - Timestamp + MD5 change detection
//! - Day/week/month retention with remote pruning
//! - Dry runs and a confirmation gate
//!
//! ## Modules
//!
//! - [`engine`] - Phased upsync executor producing a [`SyncTally`](bucketsync_core::domain::SyncTally)
//! - [`filesystem`] - Local tree enumeration and streaming MD5 fingerprints

pub mod engine;
pub mod filesystem;

use bucketsync_core::ports::remote_store::StoreError;
use thiserror::Error;

/// Errors that abort an upsync run
///
/// Failures confined to a single file or object never surface here; they are
/// recorded in the run's tally instead.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The local root, glob or options are unusable
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The target bucket does not exist
    #[error("Bucket not found: {0}")]
    BucketNotFound(String),

    /// The store rejected the credentials
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The local tree could not be enumerated
    #[error("Local I/O error: {0}")]
    LocalIo(String),

    /// The confirmation prompt could not be answered
    #[error("Confirmation failed: {0}")]
    Confirmation(String),

    /// Any other store failure outside per-object work
    #[error("Store error: {0}")]
    Store(#[source] StoreError),
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unauthorized(msg) => SyncError::Authentication(msg),
            StoreError::BucketNotFound(bucket) => SyncError::BucketNotFound(bucket),
            other => SyncError::Store(other),
        }
    }
}
