// # File Ledger Store
//
// File-based implementation of LedgerStore with crash recovery.
//
// ## Purpose
//
// Keeps the ownership ledger across daemon restarts. Losing it would make
// the manager forget which forwarded IPs it bound, so they could never be
// cleaned up.
//
// ## Crash Recovery
//
// - Atomic writes: Uses write-then-rename for atomicity
// - Corruption detection: Validates JSON on load
// - Automatic backup: Keeps .backup of last known good state
// - Recovery: Falls back to backup if corruption detected
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "interfaces": {
//     "42:01:0a:80:00:02": {
//       "forwarded_ips": ["10.0.0.5"],
//       "last_updated": "2025-01-09T12:00:00Z"
//     }
//   }
// }
// ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::ledger_store::{LedgerRecord, LedgerStore};

/// Ledger file format version
const LEDGER_FILE_VERSION: &str = "1.0";

/// File-based ledger store with crash recovery
///
/// Every `write` rewrites the whole file before returning.
///
/// # Example
///
/// ```rust,no_run
/// use fwdip_core::state::FileLedgerStore;
/// use fwdip_core::traits::LedgerStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileLedgerStore::new("/var/lib/fwdip/ledger.json").await?;
///
///     store.write("42:01:0a:80:00:02", &["10.0.0.5".to_string()]).await?;
///     let ips = store.read("42:01:0a:80:00:02").await?;
///     assert_eq!(ips, Some(vec!["10.0.0.5".to_string()]));
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileLedgerStore {
    path: PathBuf,
    state: Arc<RwLock<FileState>>,
}

#[derive(Debug)]
struct FileState {
    interfaces: HashMap<String, LedgerRecord>,
    dirty: bool,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct LedgerFileFormat {
    version: String,
    interfaces: HashMap<String, LedgerRecord>,
}

impl FileLedgerStore {
    /// Create or load a file ledger store
    ///
    /// This will:
    /// 1. Create parent directories if needed
    /// 2. Try to load the existing ledger file
    /// 3. If it is corrupted, try the backup
    /// 4. If both fail, start empty
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::config(format!(
                    "Failed to create ledger directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let interfaces = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            state: Arc::new(RwLock::new(FileState {
                interfaces,
                dirty: false,
            })),
        })
    }

    /// Load the ledger, falling back to the backup on corruption
    async fn load_with_recovery(path: &Path) -> Result<HashMap<String, LedgerRecord>, Error> {
        let e = match Self::load(path).await {
            Ok(interfaces) => {
                tracing::debug!("Loaded ledger from file: {} interfaces", interfaces.len());
                return Ok(interfaces);
            }
            Err(e @ Error::Json(_)) => e,
            Err(e) => return Err(e),
        };

        tracing::warn!("Ledger file appears corrupted: {}. Attempting recovery from backup.", e);

        let backup_path = Self::backup_path(path);
        if !backup_path.exists() {
            tracing::warn!("No backup file found. Starting with empty ledger.");
            return Ok(HashMap::new());
        }

        match Self::load(&backup_path).await {
            Ok(interfaces) => {
                tracing::info!("Recovered ledger from backup: {} interfaces", interfaces.len());
                if let Err(restore_err) = fs::copy(&backup_path, path).await {
                    tracing::error!("Failed to restore ledger file from backup: {}", restore_err);
                }
                Ok(interfaces)
            }
            Err(backup_err) => {
                tracing::error!("Backup also corrupted: {}. Starting with empty ledger.", backup_err);
                Ok(HashMap::new())
            }
        }
    }

    /// Load the ledger from a file; parse failures surface as `Error::Json`
    async fn load(path: &Path) -> Result<HashMap<String, LedgerRecord>, Error> {
        if !path.exists() {
            tracing::debug!("Ledger file does not exist: {}", path.display());
            return Ok(HashMap::new());
        }

        let content = fs::read_to_string(path)
            .await
            .map_err(io_failure("read", path))?;

        let ledger: LedgerFileFormat = serde_json::from_str(&content)?;

        if ledger.version != LEDGER_FILE_VERSION {
            tracing::warn!(
                "Ledger file version mismatch: expected {}, got {}. Attempting to load anyway.",
                LEDGER_FILE_VERSION,
                ledger.version
            );
        }

        Ok(ledger.interfaces)
    }

    /// Write the ledger atomically
    async fn write_ledger(&self) -> Result<(), Error> {
        let mut state_guard = self.state.write().await;

        let ledger = LedgerFileFormat {
            version: LEDGER_FILE_VERSION.to_string(),
            interfaces: state_guard.interfaces.clone(),
        };
        let json = serde_json::to_string_pretty(&ledger)
            .map_err(|e| Error::ledger(format!("Failed to serialize ledger: {}", e)))?;

        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path)
                .await
                .map_err(io_failure("create", &temp_path))?;
            file.write_all(json.as_bytes())
                .await
                .map_err(io_failure("write", &temp_path))?;
            file.sync_all()
                .await
                .map_err(io_failure("sync", &temp_path))?;
        }

        // Previous good state survives a torn rename
        if self.path.exists() {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("Failed to create ledger backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path)
            .await
            .map_err(io_failure("replace", &self.path))?;

        state_guard.dirty = false;
        tracing::trace!("Ledger written to file: {}", self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }

    /// Path of the ledger file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Map an I/O failure on `path` to a ledger error
fn io_failure(action: &'static str, path: &Path) -> impl FnOnce(std::io::Error) -> Error {
    let path = path.display().to_string();
    move |e| Error::ledger(format!("Failed to {} ledger file {}: {}", action, path, e))
}

#[async_trait]
impl LedgerStore for FileLedgerStore {
    async fn read(&self, mac: &str) -> Result<Option<Vec<String>>, Error> {
        let state_guard = self.state.read().await;
        Ok(state_guard
            .interfaces
            .get(mac)
            .map(|record| record.forwarded_ips.clone()))
    }

    async fn write(&self, mac: &str, forwarded_ips: &[String]) -> Result<(), Error> {
        {
            let mut state_guard = self.state.write().await;
            state_guard
                .interfaces
                .insert(mac.to_string(), LedgerRecord::new(forwarded_ips.to_vec()));
            state_guard.dirty = true;
        }

        // Immediate write for durability
        self.write_ledger().await
    }

    async fn delete(&self, mac: &str) -> Result<(), Error> {
        {
            let mut state_guard = self.state.write().await;
            if state_guard.interfaces.remove(mac).is_none() {
                return Ok(());
            }
            state_guard.dirty = true;
        }

        self.write_ledger().await
    }

    async fn list(&self) -> Result<Vec<String>, Error> {
        let state_guard = self.state.read().await;
        Ok(state_guard.interfaces.keys().cloned().collect())
    }

    async fn flush(&self) -> Result<(), Error> {
        let dirty = self.state.read().await.dirty;
        if dirty { self.write_ledger().await } else { Ok(()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const MAC: &str = "42:01:0a:80:00:02";

    fn ips(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_file_store_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.json");

        let store = FileLedgerStore::new(&path).await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
        assert_eq!(store.read(MAC).await.unwrap(), None);

        store.write(MAC, &ips(&["10.0.0.5"])).await.unwrap();
        assert!(path.exists());

        let reopened = FileLedgerStore::new(&path).await.unwrap();
        assert_eq!(reopened.read(MAC).await.unwrap(), Some(ips(&["10.0.0.5"])));
    }

    #[tokio::test]
    async fn test_file_store_corruption_recovery() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.json");

        let store = FileLedgerStore::new(&path).await.unwrap();
        store.write(MAC, &ips(&["10.0.0.5"])).await.unwrap();
        // Second write leaves the first in the backup
        store.write(MAC, &ips(&["10.0.0.6"])).await.unwrap();
        assert!(FileLedgerStore::backup_path(&path).exists());

        fs::write(&path, b"corrupted json data").await.unwrap();

        let recovered = FileLedgerStore::new(&path).await.unwrap();
        assert_eq!(recovered.read(MAC).await.unwrap(), Some(ips(&["10.0.0.5"])));
    }

    #[tokio::test]
    async fn test_file_store_corruption_without_backup_starts_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        fs::write(&path, b"{").await.unwrap();

        let store = FileLedgerStore::new(&path).await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_store_creates_parent_and_deletes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/dir/ledger.json");

        let store = FileLedgerStore::new(&path).await.unwrap();
        store.write(MAC, &[]).await.unwrap();
        assert_eq!(store.read(MAC).await.unwrap(), Some(vec![]));

        store.delete(MAC).await.unwrap();
        let reopened = FileLedgerStore::new(&path).await.unwrap();
        assert_eq!(reopened.read(MAC).await.unwrap(), None);
    }
}
