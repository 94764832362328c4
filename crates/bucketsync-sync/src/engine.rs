//! Upsync engine
//!
//! Mirrors a local tree into a bucket and optionally prunes old remote
//! snapshots. A run moves through a fixed sequence of [`SyncPhase`]s:
//!
//! 1. **Enumerate** - list local files matching the glob
//! 2. **Filter** - with retention on, keep only files some boundary would keep
//! 3. **SyncEach** - create, update or skip each file on a bounded pool
//! 4. **FetchRemoteMetadata** - list and head every matching remote object
//! 5. **ComputeKeepSet** - select the kept snapshot per boundary
//! 6. **DeleteUnkept** - delete matching objects no boundary keeps
//! 7. **Report** - hand back the tally
//!
//! Phases 4-6 only run when retention is enabled. Phases 1-2 happen in
//! [`SyncEngine::plan`], so callers can show the candidate count before the
//! confirmation gate in [`SyncEngine::run_plan`].
//!
//! ## Failure policy
//!
//! Rejected credentials abort the run immediately. Any other failure on a
//! single file or object is logged, recorded in [`SyncTally::failures`] and
//! the run carries on. The engine never retries; the store adapter does.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use futures_util::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use bucketsync_core::config::UpsyncConfig;
use bucketsync_core::domain::{
    format_mtime, parse_mtime, BucketName, Candidate, ChangeAction, ChangeDetector, GlobFilter,
    LocalFile, ObjectKey, ObjectMetadata, Precheck, RetentionPolicy, RetentionSchedule, SyncPath,
    SyncTally, MTIME_METADATA_KEY,
};
use bucketsync_core::ports::{IConfirmation, ILocalEnumerator, IRemoteStore, StoreError, Visibility};

use crate::SyncError;

// ============================================================================
// Phases
// ============================================================================

/// Stage of an upsync run; a run only ever moves forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SyncPhase {
    Enumerate,
    Filter,
    SyncEach,
    FetchRemoteMetadata,
    ComputeKeepSet,
    DeleteUnkept,
    Report,
}

impl SyncPhase {
    /// Moves `self` forward to `next`
    ///
    /// Phases may be skipped but never revisited; a backward move is ignored
    /// and logged.
    fn advance(&mut self, next: SyncPhase) {
        if next < *self {
            warn!(from = %self, to = %next, "Ignoring backward phase transition");
            return;
        }
        debug!(from = %self, to = %next, "Entering phase");
        *self = next;
    }
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SyncPhase::Enumerate => "enumerate",
            SyncPhase::Filter => "filter",
            SyncPhase::SyncEach => "sync-each",
            SyncPhase::FetchRemoteMetadata => "fetch-remote-metadata",
            SyncPhase::ComputeKeepSet => "compute-keep-set",
            SyncPhase::DeleteUnkept => "delete-unkept",
            SyncPhase::Report => "report",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Options and outcomes
// ============================================================================

/// Effective settings for one upsync run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsyncOptions {
    /// Glob matched against keys, for both upload and deletion
    pub glob: String,
    pub public: bool,
    pub no_prompt: bool,
    pub backups_retain: bool,
    pub retention: RetentionPolicy,
    pub dry_run: bool,
    /// Maximum in-flight store operations
    pub concurrency: usize,
}

impl Default for UpsyncOptions {
    fn default() -> Self {
        Self::from(&UpsyncConfig::default())
    }
}

impl From<&UpsyncConfig> for UpsyncOptions {
    fn from(config: &UpsyncConfig) -> Self {
        Self {
            glob: config.glob.clone(),
            public: config.public,
            no_prompt: config.no_prompt,
            backups_retain: config.backups_retain,
            retention: config.retention_policy(),
            dry_run: config.dry_run,
            concurrency: config.concurrency,
        }
    }
}

/// How an upsync run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// All phases ran; the tally may still list per-file failures
    Completed(SyncTally),
    /// The user declined at the confirmation gate; nothing was touched
    Declined,
    /// No local file matched and retention is off
    NothingToUpload,
}

/// Result of the enumerate and filter phases
///
/// Produced by [`SyncEngine::plan`] and consumed by [`SyncEngine::run_plan`].
#[derive(Debug, Clone)]
pub struct UpsyncPlan {
    bucket: BucketName,
    filter: GlobFilter,
    options: UpsyncOptions,
    schedule: Option<RetentionSchedule>,
    files: Vec<LocalFile>,
    filtered_out: u64,
    phase: SyncPhase,
}

impl UpsyncPlan {
    /// Local files that will go through change detection
    pub fn files(&self) -> &[LocalFile] {
        &self.files
    }

    /// Number of candidate uploads
    pub fn candidates(&self) -> usize {
        self.files.len()
    }

    /// Local files dropped by the retention filter
    pub fn filtered_out(&self) -> u64 {
        self.filtered_out
    }

    pub fn is_dry_run(&self) -> bool {
        self.options.dry_run
    }

    pub fn retention_enabled(&self) -> bool {
        self.schedule.is_some()
    }

    /// The phase the run has reached
    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    fn visibility(&self) -> Visibility {
        Visibility::from_public(self.options.public)
    }
}

/// Per-file failure inside SYNC-EACH, FETCH-REMOTE-METADATA or DELETE-UNKEPT
#[derive(Debug)]
enum ItemError {
    Store(StoreError),
    Local(anyhow::Error),
}

impl From<StoreError> for ItemError {
    fn from(err: StoreError) -> Self {
        ItemError::Store(err)
    }
}

impl std::fmt::Display for ItemError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemError::Store(e) => write!(f, "{e}"),
            ItemError::Local(e) => write!(f, "{e:#}"),
        }
    }
}

/// Folds a per-item error into the tally, or aborts on rejected credentials
fn absorb(tally: &mut SyncTally, key: &ObjectKey, err: ItemError) -> Result<(), SyncError> {
    if let ItemError::Store(StoreError::Unauthorized(msg)) = err {
        return Err(SyncError::Authentication(msg));
    }
    warn!(%key, error = %err, "Item failed, continuing");
    tally.record_failure(key.as_str(), err.to_string());
    Ok(())
}

/// The stored-mtime value a file gets when uploaded, as read back later
fn written_timestamp(modified: DateTime<Utc>) -> DateTime<Utc> {
    parse_mtime(&format_mtime(modified)).unwrap_or(modified)
}

// ============================================================================
// SyncEngine
// ============================================================================

/// Orchestrates one-way upload with optional retention
pub struct SyncEngine {
    store: Arc<dyn IRemoteStore>,
    enumerator: Arc<dyn ILocalEnumerator>,
    confirmation: Arc<dyn IConfirmation>,
    detector: ChangeDetector,
}

impl SyncEngine {
    /// Creates a new `SyncEngine` with the given collaborators
    ///
    /// # Arguments
    /// * `store` - Remote object store (IRemoteStore)
    /// * `enumerator` - Local tree listing and fingerprints (ILocalEnumerator)
    /// * `confirmation` - Gate consulted before a real run (IConfirmation)
    pub fn new(
        store: Arc<dyn IRemoteStore>,
        enumerator: Arc<dyn ILocalEnumerator>,
        confirmation: Arc<dyn IConfirmation>,
    ) -> Self {
        Self {
            store,
            enumerator,
            confirmation,
            detector: ChangeDetector::default(),
        }
    }

    /// Runs a complete upsync: plan, confirm, execute
    ///
    /// `now` anchors the retention boundaries; its time zone decides where
    /// days, weeks and months begin.
    ///
    /// # Errors
    /// See [`SyncEngine::plan`] and [`SyncEngine::run_plan`].
    pub async fn upsync<Tz: TimeZone>(
        &self,
        bucket: &BucketName,
        root: &SyncPath,
        options: UpsyncOptions,
        now: &DateTime<Tz>,
    ) -> Result<SyncOutcome, SyncError> {
        let plan = self.plan(bucket, root, options, now).await?;
        self.run_plan(plan).await
    }

    // ========================================================================
    // Enumerate + Filter
    // ========================================================================

    /// Validates the inputs and runs the ENUMERATE and FILTER phases
    ///
    /// Nothing is written to the store.
    ///
    /// # Errors
    /// - `Configuration` for a missing or non-directory root, a bad glob,
    ///   zero concurrency or a retention policy without boundaries
    /// - `BucketNotFound` if the bucket does not exist
    /// - `Authentication` / `Store` if the bucket check fails
    /// - `LocalIo` if the tree cannot be enumerated
    #[tracing::instrument(skip_all, fields(bucket = %bucket, root = %root))]
    pub async fn plan<Tz: TimeZone>(
        &self,
        bucket: &BucketName,
        root: &SyncPath,
        options: UpsyncOptions,
        now: &DateTime<Tz>,
    ) -> Result<UpsyncPlan, SyncError> {
        let filter = GlobFilter::new(&options.glob)
            .map_err(|e| SyncError::Configuration(e.to_string()))?;
        if options.concurrency == 0 {
            return Err(SyncError::Configuration(
                "concurrency must be at least 1".to_string(),
            ));
        }
        let schedule = if options.backups_retain {
            if options.retention.is_empty() {
                return Err(SyncError::Configuration(
                    "retention needs at least one day, week or month".to_string(),
                ));
            }
            Some(options.retention.schedule(now))
        } else {
            None
        };

        match tokio::fs::metadata(root.as_path()).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(SyncError::Configuration(format!(
                    "{root} is not a directory"
                )))
            }
            Err(e) => {
                return Err(SyncError::Configuration(format!(
                    "cannot access {root}: {e}"
                )))
            }
        }

        if !self.store.bucket_exists(bucket).await? {
            return Err(SyncError::BucketNotFound(bucket.to_string()));
        }

        let mut phase = SyncPhase::Enumerate;
        let files = self
            .enumerator
            .enumerate(root, &filter)
            .await
            .map_err(|e| SyncError::LocalIo(format!("{e:#}")))?;
        info!(found = files.len(), glob = filter.as_str(), "Local files enumerated");

        phase.advance(SyncPhase::Filter);
        let (files, filtered_out) = match &schedule {
            Some(schedule) => Self::retention_filter(schedule, files),
            None => (files, 0),
        };

        Ok(UpsyncPlan {
            bucket: bucket.clone(),
            filter,
            options,
            schedule,
            files,
            filtered_out,
            phase,
        })
    }

    /// Keeps only the local files some boundary would keep
    ///
    /// Local times are compared at the precision they are stored remotely.
    fn retention_filter(
        schedule: &RetentionSchedule,
        files: Vec<LocalFile>,
    ) -> (Vec<LocalFile>, u64) {
        let candidates: Vec<Candidate> = files
            .iter()
            .map(|f| Candidate::new(f.key.clone(), written_timestamp(f.modified)))
            .collect();
        let kept = schedule.select(&candidates);

        let (kept_files, dropped): (Vec<_>, Vec<_>) =
            files.into_iter().partition(|f| kept.contains(&f.key));
        for file in &dropped {
            debug!(key = %file.key, "Filtered out by retention");
        }
        info!(
            kept = kept_files.len(),
            filtered = dropped.len(),
            "Retention filter applied to local files"
        );
        (kept_files, dropped.len() as u64)
    }

    // ========================================================================
    // Gate + execution
    // ========================================================================

    /// Passes the confirmation gate and runs the remaining phases
    ///
    /// # Errors
    /// - `Authentication` if the store rejects the credentials mid-run
    /// - `Store` if the remote listing fails
    /// - `Confirmation` if the gate itself fails
    #[tracing::instrument(skip_all, fields(bucket = %plan.bucket, dry_run = plan.options.dry_run))]
    pub async fn run_plan(&self, mut plan: UpsyncPlan) -> Result<SyncOutcome, SyncError> {
        if plan.files.is_empty() && plan.schedule.is_none() {
            info!("No local files matched, nothing to upload");
            return Ok(SyncOutcome::NothingToUpload);
        }

        if !plan.options.dry_run && !plan.options.no_prompt {
            let question = format!(
                "Upload {} file(s) to {}{}?",
                plan.files.len(),
                plan.bucket,
                if plan.schedule.is_some() {
                    " and delete unkept backups"
                } else {
                    ""
                }
            );
            let agreed = self
                .confirmation
                .confirm(&question)
                .await
                .map_err(|e| SyncError::Confirmation(format!("{e:#}")))?;
            if !agreed {
                info!("Declined at confirmation, no action taken");
                return Ok(SyncOutcome::Declined);
            }
        }

        let start = std::time::Instant::now();
        let mut tally = SyncTally::new();
        tally.skipped += plan.filtered_out;

        plan.phase.advance(SyncPhase::SyncEach);
        let written = self.sync_each(&plan, &mut tally).await?;

        if let Some(schedule) = plan.schedule.clone() {
            plan.phase.advance(SyncPhase::FetchRemoteMetadata);
            let candidates = self.fetch_candidates(&plan, &written, &mut tally).await?;

            plan.phase.advance(SyncPhase::ComputeKeepSet);
            let kept = schedule.select(&candidates);
            debug!(
                boundaries = schedule.boundaries().len(),
                kept = kept.len(),
                "Keep set computed"
            );

            plan.phase.advance(SyncPhase::DeleteUnkept);
            let unkept: Vec<ObjectKey> = candidates
                .iter()
                .filter(|c| !kept.contains(&c.key))
                .map(|c| c.key.clone())
                .collect();
            tally.retained += (candidates.len() - unkept.len()) as u64;
            self.delete_unkept(&plan, unkept, &mut tally).await?;
        }

        plan.phase.advance(SyncPhase::Report);
        info!(
            created = tally.created,
            updated = tally.updated,
            skipped = tally.skipped,
            deleted = tally.deleted,
            retained = tally.retained,
            failures = tally.failures.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Upsync complete"
        );
        Ok(SyncOutcome::Completed(tally))
    }

    /// SYNC-EACH: detect and act on every planned file
    ///
    /// Returns the stored-mtime each successfully written key now carries
    /// (or would carry, in a dry run).
    async fn sync_each(
        &self,
        plan: &UpsyncPlan,
        tally: &mut SyncTally,
    ) -> Result<BTreeMap<ObjectKey, DateTime<Utc>>, SyncError> {
        let mut written = BTreeMap::new();
        let mut results = stream::iter(plan.files.iter())
            .map(|file| async move { (file, self.sync_one(plan, file).await) })
            .buffer_unordered(plan.options.concurrency);

        while let Some((file, result)) = results.next().await {
            match result {
                Ok(action) => {
                    tally.record(action);
                    if action.is_mutation() {
                        written.insert(file.key.clone(), written_timestamp(file.modified));
                    }
                }
                Err(e) => absorb(tally, &file.key, e)?,
            }
        }
        Ok(written)
    }

    async fn sync_one(&self, plan: &UpsyncPlan, file: &LocalFile) -> Result<ChangeAction, ItemError> {
        let remote = self.store.get_object(&plan.bucket, &file.key).await?;

        let action = match (self.detector.precheck(file.modified, remote.as_ref()), &remote) {
            (Precheck::Decided(action), _) => action,
            (Precheck::NeedsFingerprint, Some(remote)) => {
                let local = self
                    .enumerator
                    .fingerprint(&file.path)
                    .await
                    .map_err(ItemError::Local)?;
                self.detector.resolve(&local, remote)
            }
            (Precheck::NeedsFingerprint, None) => ChangeAction::Create,
        };

        if !action.is_mutation() {
            debug!(key = %file.key, "Unchanged, skipped");
            return Ok(action);
        }

        if !plan.options.dry_run {
            let metadata: ObjectMetadata = [(
                MTIME_METADATA_KEY.to_string(),
                format_mtime(file.modified),
            )]
            .into_iter()
            .collect();

            match action {
                ChangeAction::Create | ChangeAction::UpdateBody => {
                    self.store
                        .put_object(&plan.bucket, &file.key, &file.path, &metadata, plan.visibility())
                        .await?
                }
                ChangeAction::UpdateMetadataOnly => {
                    self.store
                        .update_metadata(&plan.bucket, &file.key, &metadata, plan.visibility())
                        .await?
                }
                ChangeAction::Skip => {}
            }
        }

        info!(key = %file.key, %action, dry_run = plan.options.dry_run, "File synced");
        Ok(action)
    }

    /// FETCH-REMOTE-METADATA: effective timestamps of every matching object
    ///
    /// In a dry run, keys written by SYNC-EACH use the timestamp they would
    /// have been given, so dry and real runs select the same keep set.
    async fn fetch_candidates(
        &self,
        plan: &UpsyncPlan,
        written: &BTreeMap<ObjectKey, DateTime<Utc>>,
        tally: &mut SyncTally,
    ) -> Result<Vec<Candidate>, SyncError> {
        let listing = self.store.list_objects(&plan.bucket).await?;
        let matching: Vec<ObjectKey> = listing
            .into_iter()
            .map(|summary| summary.key)
            .filter(|key| plan.filter.matches(key))
            .collect();
        debug!(matching = matching.len(), "Remote objects matching glob");

        let mut candidates = Vec::with_capacity(matching.len());
        let mut to_head = Vec::new();
        for key in matching {
            match written.get(&key) {
                Some(ts) if plan.options.dry_run => candidates.push(Candidate::new(key, *ts)),
                _ => to_head.push(key),
            }
        }
        if plan.options.dry_run {
            for (key, ts) in written {
                if !candidates.iter().any(|c| &c.key == key) {
                    candidates.push(Candidate::new(key.clone(), *ts));
                }
            }
        }

        let mut heads = stream::iter(to_head)
            .map(|key| async move {
                let result = self.store.get_object(&plan.bucket, &key).await;
                (key, result)
            })
            .buffer_unordered(plan.options.concurrency);

        while let Some((key, result)) = heads.next().await {
            match result {
                Ok(Some(object)) => {
                    candidates.push(Candidate::new(key, object.effective_timestamp()))
                }
                Ok(None) => debug!(%key, "Object vanished after listing"),
                Err(e) => absorb(tally, &key, ItemError::Store(e))?,
            }
        }

        Ok(candidates)
    }

    /// DELETE-UNKEPT: remove matching objects no boundary keeps
    async fn delete_unkept(
        &self,
        plan: &UpsyncPlan,
        unkept: Vec<ObjectKey>,
        tally: &mut SyncTally,
    ) -> Result<(), SyncError> {
        let dry_run = plan.options.dry_run;
        let mut deletions = stream::iter(unkept)
            .map(|key| async move {
                let result = if dry_run {
                    Ok(())
                } else {
                    self.store.delete_object(&plan.bucket, &key).await
                };
                (key, result)
            })
            .buffer_unordered(plan.options.concurrency);

        while let Some((key, result)) = deletions.next().await {
            match result {
                Ok(()) => {
                    tally.deleted += 1;
                    info!(%key, dry_run, "Remote deleted");
                }
                Err(e) => absorb(tally, &key, ItemError::Store(e))?,
            }
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
