// # Memory Ledger Store
//
// In-memory implementation of LedgerStore.
//
// ## Purpose
//
// Provides a simple, fast ledger that doesn't persist across restarts.
// Useful for testing and for hosts where nothing else ever binds secondary
// addresses.
//
// ## Crash Behavior
//
// - All entries are lost on restart/crash
// - After a restart the manager owns nothing: forwarded IPs that are no
//   longer declared stay bound until an operator removes them

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::ledger_store::{LedgerRecord, LedgerStore};

/// In-memory ledger store implementation
///
/// # Example
///
/// ```rust,no_run
/// use fwdip_core::state::MemoryLedgerStore;
/// use fwdip_core::traits::LedgerStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryLedgerStore::new();
///
///     store.write("42:01:0a:80:00:02", &["10.0.0.5".to_string()]).await?;
///
///     let ips = store.read("42:01:0a:80:00:02").await?;
///     assert_eq!(ips, Some(vec!["10.0.0.5".to_string()]));
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryLedgerStore {
    inner: Arc<RwLock<HashMap<String, LedgerRecord>>>,
}

impl MemoryLedgerStore {
    /// Create a new empty memory ledger store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of entries in the store
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn read(&self, mac: &str) -> Result<Option<Vec<String>>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.get(mac).map(|record| record.forwarded_ips.clone()))
    }

    async fn write(&self, mac: &str, forwarded_ips: &[String]) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.insert(mac.to_string(), LedgerRecord::new(forwarded_ips.to_vec()));
        Ok(())
    }

    async fn delete(&self, mac: &str) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.remove(mac);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.keys().cloned().collect())
    }

    async fn flush(&self) -> Result<(), Error> {
        Ok(())
    }
}
