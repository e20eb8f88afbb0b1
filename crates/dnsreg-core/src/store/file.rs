// # File Host Store
//
// File-based implementation of HostStore with crash recovery.
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
//   "next_id": 2,
//   "hosts": [
//     {
//       "id": 1,
//       "hostname": "myhome",
//       "subzones": "cam1,cam2",
//       "ip": "192.0.2.10",
//       "token": "9f86d081884c7d659a2feaa0c55ad015",
//       "updated_at": "2025-01-09T12:00:00Z"
//     }
//   ]
// }
// ```

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use super::HostTable;
use crate::config::HostStoreConfig;
use crate::host::{Host, NewHost};
use crate::traits::host_store::{HostStore, HostStoreFactory};
use crate::Error;

/// Store file format version
const STORE_FILE_VERSION: &str = "1.0";

/// File-based host store with crash recovery
///
/// Every mutation is written through to disk before the call returns.
///
/// # Example
///
/// ```rust,no_run
/// use dnsreg_core::store::FileHostStore;
/// use dnsreg_core::HostStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileHostStore::new("/var/lib/dnsreg/hosts.json").await?;
///     for host in store.find_all().await? {
///         println!("{} -> {}", host.hostname, host.ip);
///     }
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileHostStore {
    path: PathBuf,
    state: Arc<RwLock<FileState>>,
}

#[derive(Debug)]
struct FileState {
    table: HostTable,
    /// Table differs from the file (a backup restore failed to write back)
    dirty: bool,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct StoreFileFormat {
    version: String,
    #[serde(flatten)]
    table: HostTable,
}

impl FileHostStore {
    /// Create or load a file host store
    ///
    /// This will:
    /// 1. Try to load the existing store file
    /// 2. If corruption detected, try to load from backup
    /// 3. If both fail, start with an empty table
    /// 4. Create parent directories if needed
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    Error::config(format!(
                        "Failed to create store directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let (table, dirty) = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            state: Arc::new(RwLock::new(FileState { table, dirty })),
        })
    }

    /// Load the table, falling back to the backup on a parse failure
    ///
    /// The flag is set when the recovered table could not be copied back
    /// over the corrupt file.
    async fn load_with_recovery(path: &Path) -> Result<(HostTable, bool), Error> {
        match Self::load(path).await {
            Ok(table) => {
                tracing::debug!("Loaded host store: {} hosts", table.len());
                Ok((table, false))
            }
            Err(Error::Json(e)) => {
                tracing::warn!(
                    "Host store file appears corrupted: {}. Attempting recovery from backup.",
                    e
                );

                let backup_path = Self::backup_path(path);
                if !backup_path.exists() {
                    tracing::warn!("No backup file found. Starting with empty host store.");
                    return Ok((HostTable::default(), false));
                }

                match Self::load(&backup_path).await {
                    Ok(table) => {
                        tracing::info!("Recovered host store from backup: {} hosts", table.len());
                        if let Err(restore_err) = fs::copy(&backup_path, path).await {
                            tracing::error!(
                                "Failed to restore host store file from backup: {}",
                                restore_err
                            );
                            return Ok((table, true));
                        }
                        Ok((table, false))
                    }
                    Err(backup_err) => {
                        tracing::error!(
                            "Backup also corrupted: {}. Starting with empty host store.",
                            backup_err
                        );
                        Ok((HostTable::default(), false))
                    }
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn load(path: &Path) -> Result<HostTable, Error> {
        if !path.exists() {
            tracing::debug!("Host store file does not exist: {}", path.display());
            return Ok(HostTable::default());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::host_store(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let file: StoreFileFormat = serde_json::from_str(&content)?;

        if file.version != STORE_FILE_VERSION {
            tracing::warn!(
                "Host store version mismatch: expected {}, got {}. Attempting to load anyway.",
                STORE_FILE_VERSION,
                file.version
            );
        }

        Ok(file.table)
    }

    /// Write a table to disk atomically
    async fn write(&self, table: &HostTable) -> Result<(), Error> {
        let file = StoreFileFormat {
            version: STORE_FILE_VERSION.to_string(),
            table: table.clone(),
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| Error::host_store(format!("Failed to serialize hosts: {}", e)))?;

        let temp_path = self.temp_path();
        {
            let mut out = fs::File::create(&temp_path).await.map_err(|e| {
                Error::host_store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            out.write_all(json.as_bytes()).await.map_err(|e| {
                Error::host_store(format!("Failed to write {}: {}", temp_path.display(), e))
            })?;
            out.sync_all().await.map_err(|e| {
                Error::host_store(format!("Failed to sync {}: {}", temp_path.display(), e))
            })?;
        }

        if self.path.exists() {
            if let Err(e) = fs::copy(&self.path, Self::backup_path(&self.path)).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::host_store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("Host store written: {}", self.path.display());
        Ok(())
    }

    /// Apply a mutation to a copy of the table and commit it once on disk
    ///
    /// A failed write leaves the in-memory table untouched.
    async fn mutate<T>(
        &self,
        f: impl FnOnce(&mut HostTable) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let mut state = self.state.write().await;
        let mut next = state.table.clone();
        let out = f(&mut next)?;

        self.write(&next).await?;
        state.table = next;
        state.dirty = false;
        Ok(out)
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
}

#[async_trait]
impl HostStore for FileHostStore {
    async fn create(&self, host: NewHost) -> Result<Host, Error> {
        self.mutate(|table| table.insert(host)).await
    }

    async fn save(&self, host: &Host) -> Result<(), Error> {
        self.mutate(|table| table.update(host)).await
    }

    async fn delete(&self, host: &Host) -> Result<(), Error> {
        self.mutate(|table| {
            table.remove(host.id);
            Ok(())
        })
        .await
    }

    async fn find_by_hostname(&self, hostname: &str) -> Result<Option<Host>, Error> {
        Ok(self.state.read().await.table.by_hostname(hostname).cloned())
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<Host>, Error> {
        Ok(self.state.read().await.table.by_token(token).cloned())
    }

    async fn find_all(&self) -> Result<Vec<Host>, Error> {
        Ok(self.state.read().await.table.all())
    }

    async fn flush(&self) -> Result<(), Error> {
        let mut state = self.state.write().await;
        if state.dirty {
            self.write(&state.table).await?;
            state.dirty = false;
        }
        Ok(())
    }
}

/// Factory for the `file` host store type
pub struct FileHostStoreFactory;

#[async_trait]
impl HostStoreFactory for FileHostStoreFactory {
    async fn create(&self, config: &HostStoreConfig) -> Result<Box<dyn HostStore>, Error> {
        match config {
            HostStoreConfig::File { path } => Ok(Box::new(FileHostStore::new(path).await?)),
            _ => Err(Error::config("Invalid config for file host store")),
        }
    }
}
