// # Snapshot Source Trait
//
// Defines the interface for fetching the declarative metadata snapshot.
//
// ## Implementations
//
// - HTTP metadata server: `fwdip-metadata-http` crate

use async_trait::async_trait;

use crate::model::Snapshot;

/// Trait for snapshot source implementations
///
/// Implementations may block until the source reports a change (hanging GET);
/// callers must not assume `fetch` returns promptly.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Fetch and decode the current snapshot
    async fn fetch(&self) -> Result<Snapshot, crate::Error>;

    /// Source name for logging
    fn source_name(&self) -> &'static str;
}
