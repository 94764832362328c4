//! Remote object store port (driven/secondary port)
//!
//! This module defines the interface for talking to an S3-compatible
//! object store. The production adapter wraps `aws-sdk-s3`; an in-memory
//! adapter backs the tests.
//!
//! ## Design Notes
//!
//! - Unlike the filesystem port, errors here are classified into
//!   [`StoreError`] because the sync engine treats them differently:
//!   `Unauthorized` aborts the run, everything else is isolated per object.
//! - Metadata keys are passed without the `x-amz-meta-` prefix.

use std::path::Path;

use thiserror::Error;

use crate::domain::newtypes::{BucketName, ObjectKey};
use crate::domain::objects::{ObjectMetadata, ObjectSummary, RemoteObject};

/// Errors reported by remote store adapters
#[derive(Debug, Error)]
pub enum StoreError {
    /// The bucket does not exist or is not visible to these credentials
    #[error("Bucket not found: {0}")]
    BucketNotFound(String),

    /// Credentials were rejected (HTTP 401/403)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Local I/O failed while reading or writing an object body
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other failure reported by the backend
    #[error("Store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Returns true if the error means the credentials are unusable
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, StoreError::Unauthorized(_))
    }
}

/// Access control applied to uploaded objects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    /// Owner-only access
    #[default]
    Private,
    /// Anyone may read (`public-read` canned ACL)
    PublicRead,
}

impl Visibility {
    pub fn from_public(public: bool) -> Self {
        if public {
            Visibility::PublicRead
        } else {
            Visibility::Private
        }
    }
}

/// Port trait for object store operations
///
/// ## Implementation Notes
///
/// - `get_object` returns `Ok(None)` for a missing key; only real failures are errors.
/// - `put_object` streams the body from `path` and replaces any existing object.
/// - `update_metadata` rewrites metadata without transferring the body
///   (server-side copy onto itself for S3).
/// - Implementations may retry internally; the engine never retries.
#[async_trait::async_trait]
pub trait IRemoteStore: Send + Sync {
    /// Returns true if the bucket exists and is accessible
    async fn bucket_exists(&self, bucket: &BucketName) -> Result<bool, StoreError>;

    /// Lists all bucket names visible to the credentials
    async fn list_buckets(&self) -> Result<Vec<String>, StoreError>;

    /// Region the bucket lives in
    async fn bucket_location(&self, bucket: &BucketName) -> Result<String, StoreError>;

    /// Lists every object in the bucket
    async fn list_objects(&self, bucket: &BucketName) -> Result<Vec<ObjectSummary>, StoreError>;

    /// Fetches full metadata for one object
    async fn get_object(
        &self,
        bucket: &BucketName,
        key: &ObjectKey,
    ) -> Result<Option<RemoteObject>, StoreError>;

    /// Uploads a local file as `key` with the given metadata
    async fn put_object(
        &self,
        bucket: &BucketName,
        key: &ObjectKey,
        path: &Path,
        metadata: &ObjectMetadata,
        visibility: Visibility,
    ) -> Result<(), StoreError>;

    /// Replaces the metadata of an existing object without re-uploading the body
    async fn update_metadata(
        &self,
        bucket: &BucketName,
        key: &ObjectKey,
        metadata: &ObjectMetadata,
        visibility: Visibility,
    ) -> Result<(), StoreError>;

    /// Deletes one object
    async fn delete_object(&self, bucket: &BucketName, key: &ObjectKey) -> Result<(), StoreError>;

    /// Writes the object body to `dest`
    async fn download_object(
        &self,
        bucket: &BucketName,
        key: &ObjectKey,
        dest: &Path,
    ) -> Result<(), StoreError>;
}
