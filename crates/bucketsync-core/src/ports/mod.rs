//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the domain core
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IRemoteStore`] - Object store operations (S3 and compatible services)
//! - [`ILocalEnumerator`] - Local file listing and content fingerprints
//! - [`IConfirmation`] - Yes/no gate before destructive runs

pub mod confirmation;
pub mod local_enumerator;
pub mod remote_store;

pub use confirmation::{FixedConfirmation, IConfirmation};
pub use local_enumerator::ILocalEnumerator;
pub use remote_store::{IRemoteStore, StoreError, Visibility};
