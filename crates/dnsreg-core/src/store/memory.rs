// # Memory Host Store
//
// In-memory implementation of HostStore.
//
// ## Crash Behavior
//
// - All registrations are lost on restart
// - The zone keeps the records; they become orphans until removed by hand
//
// ## When to Use
//
// - Testing environments
// - Local development against a throwaway zone

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::HostTable;
use crate::config::HostStoreConfig;
use crate::host::{Host, NewHost};
use crate::traits::host_store::{HostStore, HostStoreFactory};
use crate::Error;

/// In-memory host store implementation
///
/// Cloning yields another handle onto the same table.
///
/// # Example
///
/// ```rust,no_run
/// use dnsreg_core::store::MemoryHostStore;
/// use dnsreg_core::HostStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryHostStore::new();
///     assert!(store.find_by_hostname("myhome").await?.is_none());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryHostStore {
    inner: Arc<RwLock<HostTable>>,
}

impl MemoryHostStore {
    /// Create a new empty memory host store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of Hosts in the store
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl HostStore for MemoryHostStore {
    async fn create(&self, host: NewHost) -> Result<Host, Error> {
        self.inner.write().await.insert(host)
    }

    async fn save(&self, host: &Host) -> Result<(), Error> {
        self.inner.write().await.update(host)
    }

    async fn delete(&self, host: &Host) -> Result<(), Error> {
        self.inner.write().await.remove(host.id);
        Ok(())
    }

    async fn find_by_hostname(&self, hostname: &str) -> Result<Option<Host>, Error> {
        Ok(self.inner.read().await.by_hostname(hostname).cloned())
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<Host>, Error> {
        Ok(self.inner.read().await.by_token(token).cloned())
    }

    async fn find_all(&self) -> Result<Vec<Host>, Error> {
        Ok(self.inner.read().await.all())
    }

    async fn flush(&self) -> Result<(), Error> {
        // Nothing buffered
        Ok(())
    }
}

/// Factory for the `memory` host store type
pub struct MemoryHostStoreFactory;

#[async_trait]
impl HostStoreFactory for MemoryHostStoreFactory {
    async fn create(&self, config: &HostStoreConfig) -> Result<Box<dyn HostStore>, Error> {
        match config {
            HostStoreConfig::Memory => Ok(Box::new(MemoryHostStore::new())),
            _ => Err(Error::config("Invalid config for memory host store")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{SubZones, Token};

    fn new_host(hostname: &str, token: &str) -> NewHost {
        NewHost {
            hostname: hostname.to_string(),
            subzones: SubZones::parse("cam1").unwrap(),
            ip: "192.0.2.1".parse().unwrap(),
            token: Token::from(token),
            updated_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_memory_store_basic() {
        let store = MemoryHostStore::new();
        assert!(store.is_empty().await);

        let host = store.create(new_host("myhome", "t1")).await.unwrap();
        assert_eq!(store.len().await, 1);

        let by_name = store.find_by_hostname("myhome").await.unwrap();
        assert_eq!(by_name.as_ref().map(|h| h.id), Some(host.id));

        let by_token = store.find_by_token("t1").await.unwrap();
        assert_eq!(by_token.map(|h| h.hostname), Some("myhome".to_string()));

        store.delete(&host).await.unwrap();
        assert!(store.is_empty().await);

        // Deleting twice is fine
        store.delete(&host).await.unwrap();
    }

    #[tokio::test]
    async fn test_memory_store_save() {
        let store = MemoryHostStore::new();
        let mut host = store.create(new_host("myhome", "t1")).await.unwrap();

        host.ip = "192.0.2.99".parse().unwrap();
        store.save(&host).await.unwrap();

        let reloaded = store.find_by_token("t1").await.unwrap().unwrap();
        assert_eq!(reloaded.ip, host.ip);

        store.delete(&host).await.unwrap();
        assert!(matches!(store.save(&host).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_memory_store_clones_share_state() {
        let store = MemoryHostStore::new();
        let handle = store.clone();

        store.create(new_host("hosta", "ta")).await.unwrap();
        store.create(new_host("hostb", "tb")).await.unwrap();

        let all = handle.find_all().await.unwrap();
        let names: Vec<_> = all.iter().map(|h| h.hostname.as_str()).collect();
        assert_eq!(names, vec!["hosta", "hostb"]);
    }
}
