// # Ledger Store Implementations
//
// This module provides implementations of the LedgerStore trait for
// different persistence strategies.

pub mod file;
pub mod memory;

pub use file::FileLedgerStore;
pub use memory::MemoryLedgerStore;

use crate::config::LedgerStoreConfig;
use crate::error::Result;
use crate::traits::LedgerStore;

/// Build the ledger store described by `config`
pub async fn from_config(config: &LedgerStoreConfig) -> Result<Box<dyn LedgerStore>> {
    match config {
        LedgerStoreConfig::File { path } => Ok(Box::new(FileLedgerStore::new(path).await?)),
        LedgerStoreConfig::Memory => Ok(Box::new(MemoryLedgerStore::new())),
    }
}
