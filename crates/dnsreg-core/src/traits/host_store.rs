// # Host Store Trait
//
// Defines the interface for durable storage of Host records.
//
// ## Purpose
//
// The host store is the single source of truth for ownership: every
// token check reads it before any remote DNS mutation happens.
//
// ## Implementations
//
// - In-memory: `MemoryHostStore`
// - File-based: `FileHostStore` (JSON with atomic rename and backup)
//
// ## Usage
//
// ```rust,ignore
// use dnsreg_core::HostStore;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let store = /* HostStore implementation */;
//
//     if let Some(host) = store.find_by_hostname("myhome").await? {
//         println!("{} -> {}", host.hostname, host.ip);
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

use crate::host::{Host, NewHost};

/// Trait for host store implementations
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks.
/// Serializing read-modify-write sequences on one hostname is the engine's
/// job; the store only guarantees that each call is atomic on its own.
///
/// # Allowed Capabilities
/// - ✅ Perform I/O for persistent storage (files, databases, etc.)
/// - ✅ Enforce hostname uniqueness on `create`
///
/// # Forbidden Capabilities
/// - ❌ Perform DNS updates (owned by `ZoneProvider`)
/// - ❌ Decide expiry or ownership (owned by `RegistrationEngine`)
#[async_trait]
pub trait HostStore: Send + Sync {
    /// Persist a new Host and assign its id
    ///
    /// # Returns
    ///
    /// - `Ok(Host)`: The stored Host with its id
    /// - `Err(Error::AlreadyRegistered)`: A Host with this hostname exists
    /// - `Err(Error)`: Storage error
    async fn create(&self, host: NewHost) -> Result<Host, crate::Error>;

    /// Overwrite an existing Host
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Successfully saved
    /// - `Err(Error::NotFound)`: The Host was deleted in the meantime
    /// - `Err(Error)`: Storage error
    async fn save(&self, host: &Host) -> Result<(), crate::Error>;

    /// Remove a Host (succeeds if already gone)
    async fn delete(&self, host: &Host) -> Result<(), crate::Error>;

    /// Look up a Host by its main-zone hostname
    async fn find_by_hostname(&self, hostname: &str) -> Result<Option<Host>, crate::Error>;

    /// Look up a Host by its token
    async fn find_by_token(&self, token: &str) -> Result<Option<Host>, crate::Error>;

    /// List all Hosts, ordered by id
    async fn find_all(&self) -> Result<Vec<Host>, crate::Error>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;
}

/// Helper trait for constructing host stores from configuration
#[async_trait]
pub trait HostStoreFactory: Send + Sync {
    /// Create a HostStore instance from configuration
    async fn create(
        &self,
        config: &crate::config::HostStoreConfig,
    ) -> Result<Box<dyn HostStore>, crate::Error>;
}
