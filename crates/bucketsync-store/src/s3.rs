//! S3Session - IRemoteStore implementation for S3 and compatible services
//!
//! Wraps an `aws_sdk_s3::Client` built once from [`StoreConfig`].
//!
//! ## Design Notes
//!
//! - Explicit credentials from the config take precedence; without them the
//!   AWS default credential chain applies.
//! - A custom `endpoint_url` switches to path-style addressing so that
//!   MinIO and similar services work without wildcard DNS.
//! - SDK errors are classified into [`StoreError`]: 401/403 and the
//!   credential error codes map to `Unauthorized`, `NoSuchBucket` to
//!   `BucketNotFound`, everything else to `Backend`.

use std::collections::HashMap;
use std::path::Path;

use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{MetadataDirective, ObjectCannedAcl};
use aws_sdk_s3::Client as S3Client;
use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use bucketsync_core::config::StoreConfig;
use bucketsync_core::domain::newtypes::{BucketName, Fingerprint, ObjectKey};
use bucketsync_core::domain::objects::{ObjectMetadata, ObjectSummary, RemoteObject};
use bucketsync_core::ports::remote_store::{IRemoteStore, StoreError, Visibility};

/// Error codes S3 uses for rejected credentials
const AUTH_ERROR_CODES: &[&str] = &[
    "AccessDenied",
    "InvalidAccessKeyId",
    "SignatureDoesNotMatch",
    "ExpiredToken",
    "InvalidToken",
];

/// Region reported for buckets without a location constraint
const DEFAULT_BUCKET_REGION: &str = "us-east-1";

/// Provider name attached to static credentials
const CREDENTIALS_PROVIDER: &str = "bucketsync-config";

// ============================================================================
// Error classification
// ============================================================================

/// Maps an SDK error onto the port's error classes
fn classify<E>(err: SdkError<E, HttpResponse>, bucket: &BucketName) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let message = DisplayErrorContext(&err).to_string();

    if is_unauthorized(&err) {
        return StoreError::Unauthorized(message);
    }
    if err.as_service_error().and_then(|e| e.code()) == Some("NoSuchBucket") {
        return StoreError::BucketNotFound(bucket.to_string());
    }
    StoreError::Backend(message)
}

/// 401/403 responses and the credential error codes
fn is_unauthorized<E>(err: &SdkError<E, HttpResponse>) -> bool
where
    E: ProvideErrorMetadata,
{
    let status = err.raw_response().map(|r| r.status().as_u16());
    let code = err.as_service_error().and_then(|e| e.code());
    matches!(status, Some(401 | 403)) || code.is_some_and(|c| AUTH_ERROR_CODES.contains(&c))
}

/// Returns true if the error is a plain 404 (HEAD responses carry no error code)
fn is_not_found<E>(err: &SdkError<E, HttpResponse>) -> bool {
    err.raw_response().map(|r| r.status().as_u16()) == Some(404)
}

fn to_chrono(dt: Option<&aws_sdk_s3::primitives::DateTime>) -> DateTime<Utc> {
    dt.and_then(|dt| DateTime::from_timestamp(dt.secs(), dt.subsec_nanos()))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

fn parse_fingerprint(etag: Option<&str>, key: &ObjectKey) -> Result<Fingerprint, StoreError> {
    let etag = etag.ok_or_else(|| StoreError::Backend(format!("No ETag returned for {key}")))?;
    Fingerprint::from_etag(etag).map_err(|e| StoreError::Backend(e.to_string()))
}

/// `bucket/key` with every key segment percent-encoded, for `x-amz-copy-source`
fn copy_source(bucket: &BucketName, key: &ObjectKey) -> Result<String, StoreError> {
    let mut url = url::Url::parse("http://copy-source")
        .map_err(|e| StoreError::Backend(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| StoreError::Backend("copy-source URL cannot be a base".to_string()))?
        .push(bucket.as_str())
        .extend(key.as_str().split('/'));
    Ok(url.path().trim_start_matches('/').to_string())
}

fn canned_acl(visibility: Visibility) -> Option<ObjectCannedAcl> {
    match visibility {
        Visibility::PublicRead => Some(ObjectCannedAcl::PublicRead),
        Visibility::Private => None,
    }
}

fn to_sdk_metadata(metadata: &ObjectMetadata) -> HashMap<String, String> {
    metadata
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

// ============================================================================
// S3Session
// ============================================================================

/// Remote store backed by S3 (or any S3-compatible endpoint)
#[derive(Debug, Clone)]
pub struct S3Session {
    client: S3Client,
}

impl S3Session {
    /// Builds the client from config and verifies the credentials
    ///
    /// # Errors
    /// `StoreError::Unauthorized` if the store rejects the credentials.
    #[tracing::instrument(skip(config), fields(region = %config.region))]
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let session = Self::from_config(config).await;
        session.verify_credentials().await?;
        info!("Connected to object store");
        Ok(session)
    }

    /// Builds the client from config without contacting the store
    pub async fn from_config(config: &StoreConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        if let (Some(access_key), Some(secret_key)) = (&config.access_key, &config.secret_key) {
            loader = loader.credentials_provider(Credentials::new(
                access_key,
                secret_key,
                None,
                None,
                CREDENTIALS_PROVIDER,
            ));
        }
        if let Some(endpoint) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }

        let sdk_config = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.endpoint_url.is_some())
            .build();

        Self::from_client(S3Client::from_conf(s3_config))
    }

    /// Wraps an already configured client
    pub fn from_client(client: S3Client) -> Self {
        Self { client }
    }

    /// Lists buckets once; a 403 here means the keys are unusable
    async fn verify_credentials(&self) -> Result<(), StoreError> {
        self.list_buckets().await.map(|_| ())
    }
}

#[async_trait::async_trait]
impl IRemoteStore for S3Session {
    #[tracing::instrument(skip(self), fields(bucket = %bucket))]
    async fn bucket_exists(&self, bucket: &BucketName) -> Result<bool, StoreError> {
        match self.client.head_bucket().bucket(bucket.as_str()).send().await {
            Ok(_) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => {
                if e.as_service_error().is_some_and(|se| se.is_not_found()) {
                    Ok(false)
                } else {
                    Err(classify(e, bucket))
                }
            }
        }
    }

    #[tracing::instrument(skip(self))]
    async fn list_buckets(&self) -> Result<Vec<String>, StoreError> {
        let response = self.client.list_buckets().send().await.map_err(|e| {
            let message = DisplayErrorContext(&e).to_string();
            if is_unauthorized(&e) {
                StoreError::Unauthorized(message)
            } else {
                StoreError::Backend(message)
            }
        })?;

        let mut names: Vec<String> = response
            .buckets()
            .iter()
            .filter_map(|b| b.name().map(str::to_owned))
            .collect();
        names.sort();
        debug!(count = names.len(), "Listed buckets");
        Ok(names)
    }

    #[tracing::instrument(skip(self), fields(bucket = %bucket))]
    async fn bucket_location(&self, bucket: &BucketName) -> Result<String, StoreError> {
        let response = self
            .client
            .get_bucket_location()
            .bucket(bucket.as_str())
            .send()
            .await
            .map_err(|e| classify(e, bucket))?;

        // An empty constraint is the legacy spelling of us-east-1
        let location = response
            .location_constraint()
            .map(|c| c.as_str())
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_BUCKET_REGION)
            .to_string();
        debug!(%location, "Resolved bucket location");
        Ok(location)
    }

    #[tracing::instrument(skip(self), fields(bucket = %bucket))]
    async fn list_objects(&self, bucket: &BucketName) -> Result<Vec<ObjectSummary>, StoreError> {
        let mut summaries = Vec::new();
        let mut continuation: Option<String> = None;
        let mut page = 0u32;

        loop {
            page += 1;
            let response = self
                .client
                .list_objects_v2()
                .bucket(bucket.as_str())
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| classify(e, bucket))?;

            for object in response.contents() {
                let Some(raw_key) = object.key() else {
                    continue;
                };
                let key = match ObjectKey::new(raw_key.to_string()) {
                    Ok(key) => key,
                    Err(e) => {
                        debug!(key = raw_key, error = %e, "Skipping unsupported key");
                        continue;
                    }
                };
                let fingerprint = parse_fingerprint(object.e_tag(), &key)?;
                summaries.push(ObjectSummary {
                    fingerprint,
                    last_modified: to_chrono(object.last_modified()),
                    size: object.size().unwrap_or(0).max(0) as u64,
                    key,
                });
            }

            debug!(page, total = summaries.len(), "Fetched listing page");

            match (response.is_truncated(), response.next_continuation_token()) {
                (Some(true), Some(token)) => continuation = Some(token.to_string()),
                _ => break,
            }
        }

        Ok(summaries)
    }

    #[tracing::instrument(skip(self), fields(bucket = %bucket, key = %key))]
    async fn get_object(
        &self,
        bucket: &BucketName,
        key: &ObjectKey,
    ) -> Result<Option<RemoteObject>, StoreError> {
        let response = match self
            .client
            .head_object()
            .bucket(bucket.as_str())
            .key(key.as_str())
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if is_not_found(&e) => return Ok(None),
            Err(e) => return Err(classify(e, bucket)),
        };

        let metadata: ObjectMetadata = response
            .metadata()
            .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();

        Ok(Some(RemoteObject {
            key: key.clone(),
            fingerprint: parse_fingerprint(response.e_tag(), key)?,
            metadata,
            last_modified: to_chrono(response.last_modified()),
            size: response.content_length().unwrap_or(0).max(0) as u64,
        }))
    }

    #[tracing::instrument(skip(self, metadata), fields(bucket = %bucket, key = %key))]
    async fn put_object(
        &self,
        bucket: &BucketName,
        key: &ObjectKey,
        path: &Path,
        metadata: &ObjectMetadata,
        visibility: Visibility,
    ) -> Result<(), StoreError> {
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StoreError::Io(std::io::Error::other(e)))?;

        self.client
            .put_object()
            .bucket(bucket.as_str())
            .key(key.as_str())
            .body(body)
            .set_metadata(Some(to_sdk_metadata(metadata)))
            .set_acl(canned_acl(visibility))
            .send()
            .await
            .map_err(|e| classify(e, bucket))?;

        debug!("Uploaded object body");
        Ok(())
    }

    #[tracing::instrument(skip(self, metadata), fields(bucket = %bucket, key = %key))]
    async fn update_metadata(
        &self,
        bucket: &BucketName,
        key: &ObjectKey,
        metadata: &ObjectMetadata,
        visibility: Visibility,
    ) -> Result<(), StoreError> {
        self.client
            .copy_object()
            .bucket(bucket.as_str())
            .key(key.as_str())
            .copy_source(copy_source(bucket, key)?)
            .metadata_directive(MetadataDirective::Replace)
            .set_metadata(Some(to_sdk_metadata(metadata)))
            .set_acl(canned_acl(visibility))
            .send()
            .await
            .map_err(|e| classify(e, bucket))?;

        debug!("Replaced object metadata");
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(bucket = %bucket, key = %key))]
    async fn delete_object(&self, bucket: &BucketName, key: &ObjectKey) -> Result<(), StoreError> {
        self.client
            .delete_object()
            .bucket(bucket.as_str())
            .key(key.as_str())
            .send()
            .await
            .map_err(|e| classify(e, bucket))?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(bucket = %bucket, key = %key, dest = %dest.display()))]
    async fn download_object(
        &self,
        bucket: &BucketName,
        key: &ObjectKey,
        dest: &Path,
    ) -> Result<(), StoreError> {
        let response = self
            .client
            .get_object()
            .bucket(bucket.as_str())
            .key(key.as_str())
            .send()
            .await
            .map_err(|e| classify(e, bucket))?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut body = response.body;
        let mut file = tokio::fs::File::create(dest).await?;
        let mut bytes = 0u64;
        while let Some(chunk) = body
            .try_next()
            .await
            .map_err(|e| StoreError::Io(std::io::Error::other(e)))?
        {
            file.write_all(&chunk).await?;
            bytes += chunk.len() as u64;
        }
        file.flush().await?;

        debug!(bytes, "Downloaded object");
        Ok(())
    }
}
