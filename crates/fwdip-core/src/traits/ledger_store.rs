// # Ledger Store Trait
//
// Defines the interface for the durable ownership ledger.
//
// ## Purpose
//
// The ledger records, per hardware address, the forwarded IPs this manager
// believes it has bound. It is the only thing that distinguishes "addresses
// we manage" from "addresses present for other reasons": the reconciler never
// removes an address that is not in the ledger.
//
// ## Implementations
//
// - File-based: versioned JSON with backup recovery
// - Memory: tests and ephemeral deployments

use async_trait::async_trait;

/// Ledger entry for one interface
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LedgerRecord {
    /// Forwarded IPs believed to be bound by this manager
    pub forwarded_ips: Vec<String>,
    /// Timestamp of the last write
    pub last_updated: chrono::DateTime<chrono::Utc>,
}

impl LedgerRecord {
    /// Create a ledger entry stamped with the current time
    pub(crate) fn new(forwarded_ips: Vec<String>) -> Self {
        Self {
            forwarded_ips,
            last_updated: chrono::Utc::now(),
        }
    }
}

/// Trait for ledger store implementations
///
/// Keys are canonical hardware address strings (lowercase, colon-separated).
/// Every `write` replaces the whole entry; there are no partial updates.
///
/// # Trust Level: Trusted (Core Component)
///
/// ## Allowed Capabilities
/// - ✅ Perform I/O for persistent storage
/// - ✅ Cache entries in memory (with explicit flush)
///
/// ## Forbidden Capabilities
/// - ❌ Decide what is owned (owned by `Reconciler`)
/// - ❌ Touch network interfaces (owned by `NetworkBackend`)
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Read the forwarded IPs recorded for an interface
    ///
    /// # Returns
    ///
    /// - `Ok(Some(ips))`: The recorded list (possibly empty)
    /// - `Ok(None)`: No entry for this hardware address
    /// - `Err(Error)`: Storage error
    async fn read(&self, mac: &str) -> Result<Option<Vec<String>>, crate::Error>;

    /// Replace the entry for an interface
    async fn write(&self, mac: &str, forwarded_ips: &[String]) -> Result<(), crate::Error>;

    /// Delete the entry for an interface (no-op if absent)
    async fn delete(&self, mac: &str) -> Result<(), crate::Error>;

    /// List all hardware addresses with an entry
    async fn list(&self) -> Result<Vec<String>, crate::Error>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;
}
