//! bucketsync core - Domain logic and business rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain types** - `LocalFile`, `RemoteObject`, `Fingerprint`, `SyncTally`
//! - **Change detection** - timestamp pre-check plus lazy fingerprint comparison
//! - **Retention scheduling** - grandfather-father-son boundary selection
//! - **Port definitions** - Traits for adapters: `IRemoteStore`, `ILocalEnumerator`, `IConfirmation`
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module contains pure business logic with no I/O.
//! Ports define trait interfaces that adapter crates implement.

pub mod config;
pub mod domain;
pub mod ports;
