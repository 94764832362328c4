//! Domain entities and business logic
//!
//! This module contains the core domain types for bucketsync:
//! - Newtypes for validated keys, bucket names, fingerprints and paths
//! - Local file and remote object snapshots
//! - Glob filtering shared by upload and deletion
//! - Change detection (timestamp pre-check + fingerprint resolution)
//! - Grandfather-father-son retention scheduling
//! - Per-run tally and report line
//! - Domain-specific error types

pub mod change;
pub mod errors;
pub mod filter;
pub mod newtypes;
pub mod objects;
pub mod retention;
pub mod tally;

// Re-export commonly used types
pub use change::{format_mtime, parse_mtime, ChangeAction, ChangeDetector, Precheck};
pub use errors::DomainError;
pub use filter::GlobFilter;
pub use newtypes::*;
pub use objects::{LocalFile, ObjectMetadata, ObjectSummary, RemoteObject, MTIME_METADATA_KEY};
pub use retention::{Candidate, KeptSet, RetentionPolicy, RetentionSchedule};
pub use tally::{SyncFailure, SyncTally};
