//! In-memory IRemoteStore used by tests
//!
//! Objects live in a mutex-guarded map per bucket. ETags are real MD5
//! digests of the stored body so change detection behaves as it does
//! against S3. Every mutating call is counted, which lets tests assert
//! that dry runs and metadata-only updates never transfer a body.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tracing::debug;

use bucketsync_core::domain::newtypes::{BucketName, Fingerprint, ObjectKey};
use bucketsync_core::domain::objects::{ObjectMetadata, ObjectSummary, RemoteObject};
use bucketsync_core::ports::remote_store::{IRemoteStore, StoreError, Visibility};

/// Location reported for every in-memory bucket
pub const MEMORY_REGION: &str = "us-east-1";

/// One stored object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub metadata: ObjectMetadata,
    pub last_modified: DateTime<Utc>,
    pub visibility: Visibility,
}

impl StoredObject {
    fn fingerprint(&self) -> Fingerprint {
        Fingerprint::from_digest(md5::compute(&self.body).0)
    }
}

type Buckets = BTreeMap<String, BTreeMap<ObjectKey, StoredObject>>;

/// Remote store kept entirely in memory
#[derive(Debug, Default)]
pub struct MemoryRemoteStore {
    buckets: Mutex<Buckets>,
    failing_keys: Mutex<BTreeSet<ObjectKey>>,
    unauthorized: AtomicBool,
    puts: AtomicU64,
    metadata_updates: AtomicU64,
    deletes: AtomicU64,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already has an empty bucket
    pub fn with_bucket(bucket: &BucketName) -> Self {
        let store = Self::new();
        store.create_bucket(bucket);
        store
    }

    pub fn create_bucket(&self, bucket: &BucketName) {
        self.state().entry(bucket.to_string()).or_default();
    }

    /// Seeds an object directly, bypassing the mutation counters
    pub fn insert_object(
        &self,
        bucket: &BucketName,
        key: &ObjectKey,
        body: impl Into<Vec<u8>>,
        metadata: ObjectMetadata,
        last_modified: DateTime<Utc>,
    ) {
        self.state().entry(bucket.to_string()).or_default().insert(
            key.clone(),
            StoredObject {
                body: body.into(),
                metadata,
                last_modified,
                visibility: Visibility::Private,
            },
        );
    }

    /// Snapshot of one object
    pub fn object(&self, bucket: &BucketName, key: &ObjectKey) -> Option<StoredObject> {
        self.state()
            .get(bucket.as_str())
            .and_then(|objects| objects.get(key))
            .cloned()
    }

    /// Keys currently in the bucket, sorted
    pub fn keys(&self, bucket: &BucketName) -> Vec<ObjectKey> {
        self.state()
            .get(bucket.as_str())
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Makes every operation on `key` fail with a backend error
    pub fn fail_key(&self, key: &ObjectKey) {
        self.failing_keys
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.clone());
    }

    /// Makes every operation fail as if the credentials were revoked
    pub fn set_unauthorized(&self, unauthorized: bool) {
        self.unauthorized.store(unauthorized, Ordering::SeqCst);
    }

    pub fn put_count(&self) -> u64 {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn metadata_update_count(&self) -> u64 {
        self.metadata_updates.load(Ordering::SeqCst)
    }

    pub fn delete_count(&self) -> u64 {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Total number of mutating calls
    pub fn mutation_count(&self) -> u64 {
        self.put_count() + self.metadata_update_count() + self.delete_count()
    }

    fn state(&self) -> MutexGuard<'_, Buckets> {
        self.buckets.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_access(&self, key: Option<&ObjectKey>) -> Result<(), StoreError> {
        if self.unauthorized.load(Ordering::SeqCst) {
            return Err(StoreError::Unauthorized("credentials revoked".to_string()));
        }
        if let Some(key) = key {
            let failing = self.failing_keys.lock().unwrap_or_else(|e| e.into_inner());
            if failing.contains(key) {
                return Err(StoreError::Backend(format!("injected failure for {key}")));
            }
        }
        Ok(())
    }

    fn objects_mut<'a>(
        state: &'a mut Buckets,
        bucket: &BucketName,
    ) -> Result<&'a mut BTreeMap<ObjectKey, StoredObject>, StoreError> {
        state
            .get_mut(bucket.as_str())
            .ok_or_else(|| StoreError::BucketNotFound(bucket.to_string()))
    }
}

#[async_trait::async_trait]
impl IRemoteStore for MemoryRemoteStore {
    async fn bucket_exists(&self, bucket: &BucketName) -> Result<bool, StoreError> {
        self.check_access(None)?;
        Ok(self.state().contains_key(bucket.as_str()))
    }

    async fn list_buckets(&self) -> Result<Vec<String>, StoreError> {
        self.check_access(None)?;
        Ok(self.state().keys().cloned().collect())
    }

    async fn bucket_location(&self, bucket: &BucketName) -> Result<String, StoreError> {
        self.check_access(None)?;
        let mut state = self.state();
        Self::objects_mut(&mut state, bucket)?;
        Ok(MEMORY_REGION.to_string())
    }

    async fn list_objects(&self, bucket: &BucketName) -> Result<Vec<ObjectSummary>, StoreError> {
        self.check_access(None)?;
        let mut state = self.state();
        let objects = Self::objects_mut(&mut state, bucket)?;
        Ok(objects
            .iter()
            .map(|(key, obj)| ObjectSummary {
                key: key.clone(),
                fingerprint: obj.fingerprint(),
                last_modified: obj.last_modified,
                size: obj.body.len() as u64,
            })
            .collect())
    }

    async fn get_object(
        &self,
        bucket: &BucketName,
        key: &ObjectKey,
    ) -> Result<Option<RemoteObject>, StoreError> {
        self.check_access(Some(key))?;
        let mut state = self.state();
        let objects = Self::objects_mut(&mut state, bucket)?;
        Ok(objects.get(key).map(|obj| RemoteObject {
            key: key.clone(),
            fingerprint: obj.fingerprint(),
            metadata: obj.metadata.clone(),
            last_modified: obj.last_modified,
            size: obj.body.len() as u64,
        }))
    }

    async fn put_object(
        &self,
        bucket: &BucketName,
        key: &ObjectKey,
        path: &Path,
        metadata: &ObjectMetadata,
        visibility: Visibility,
    ) -> Result<(), StoreError> {
        self.check_access(Some(key))?;
        let body = tokio::fs::read(path).await?;

        let mut state = self.state();
        let objects = Self::objects_mut(&mut state, bucket)?;
        objects.insert(
            key.clone(),
            StoredObject {
                body,
                metadata: metadata.clone(),
                last_modified: Utc::now(),
                visibility,
            },
        );
        self.puts.fetch_add(1, Ordering::SeqCst);
        debug!(%bucket, %key, "memory put");
        Ok(())
    }

    async fn update_metadata(
        &self,
        bucket: &BucketName,
        key: &ObjectKey,
        metadata: &ObjectMetadata,
        visibility: Visibility,
    ) -> Result<(), StoreError> {
        self.check_access(Some(key))?;
        let mut state = self.state();
        let objects = Self::objects_mut(&mut state, bucket)?;
        let obj = objects
            .get_mut(key)
            .ok_or_else(|| StoreError::Backend(format!("NoSuchKey: {key}")))?;
        obj.metadata = metadata.clone();
        obj.visibility = visibility;
        obj.last_modified = Utc::now();
        self.metadata_updates.fetch_add(1, Ordering::SeqCst);
        debug!(%bucket, %key, "memory metadata update");
        Ok(())
    }

    async fn delete_object(&self, bucket: &BucketName, key: &ObjectKey) -> Result<(), StoreError> {
        self.check_access(Some(key))?;
        let mut state = self.state();
        let objects = Self::objects_mut(&mut state, bucket)?;
        objects.remove(key);
        self.deletes.fetch_add(1, Ordering::SeqCst);
        debug!(%bucket, %key, "memory delete");
        Ok(())
    }

    async fn download_object(
        &self,
        bucket: &BucketName,
        key: &ObjectKey,
        dest: &Path,
    ) -> Result<(), StoreError> {
        self.check_access(Some(key))?;
        let body = {
            let mut state = self.state();
            let objects = Self::objects_mut(&mut state, bucket)?;
            objects
                .get(key)
                .map(|obj| obj.body.clone())
                .ok_or_else(|| StoreError::Backend(format!("NoSuchKey: {key}")))?
        };

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(dest, body).await?;
        Ok(())
    }
}
