//! Core traits for the forwarded IP manager
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`NetworkBackend`]: Enumerate interfaces and bind/unbind addresses
//! - [`LedgerStore`]: Durable ownership ledger, keyed by hardware address
//! - [`SnapshotSource`]: Fetch the declarative metadata snapshot
//! - [`ConfigSource`]: Local override configuration lookup

pub mod config_source;
pub mod ledger_store;
pub mod network_backend;
pub mod snapshot_source;

pub use config_source::ConfigSource;
pub use ledger_store::{LedgerRecord, LedgerStore};
pub use network_backend::{LiveAddress, LiveInterface, NetworkBackend, host_prefix_len};
pub use snapshot_source::SnapshotSource;
