//! bucketsync store - Object store adapters
//!
//! Provides implementations of the [`IRemoteStore`] port:
//! - S3 and S3-compatible services via `aws-sdk-s3`
//! - An in-memory store for tests
//!
//! ## Modules
//!
//! - [`s3`] - `S3Session`, built once from `StoreConfig`
//! - [`memory`] - `MemoryRemoteStore`, MD5 ETags and mutation counters
//!
//! [`IRemoteStore`]: bucketsync_core::ports::IRemoteStore

pub mod memory;
pub mod s3;

pub use memory::MemoryRemoteStore;
pub use s3::S3Session;
