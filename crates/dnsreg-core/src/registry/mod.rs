//! Plugin-based backend registry
//!
//! The registry maps zone provider and host store type names to factories,
//! so the daemon builds its backends from configuration without hardcoded
//! if-else chains.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dnsreg_core::registry::BackendRegistry;
//!
//! let registry = BackendRegistry::with_builtins("example.net");
//!
//! // In dnsreg-provider-powerdns
//! dnsreg_provider_powerdns::register(&registry);
//!
//! let provider = registry.create_provider(&config.provider)?;
//! let store = registry.create_host_store(&config.host_store).await?;
//! ```

use crate::config::{HostStoreConfig, ProviderConfig};
use crate::error::{Error, Result};
use crate::store::{FileHostStoreFactory, MemoryHostStoreFactory};
use crate::traits::{HostStore, HostStoreFactory, ZoneProvider, ZoneProviderFactory};
use crate::zone::MemoryZoneProviderFactory;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Registry of zone provider and host store factories
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct BackendRegistry {
    /// Registered zone provider factories
    providers: RwLock<HashMap<String, Box<dyn ZoneProviderFactory>>>,

    /// Registered host store factories
    host_stores: RwLock<HashMap<String, Arc<dyn HostStoreFactory>>>,
}

impl BackendRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the backends shipped with this crate
    ///
    /// - `memory` zone provider (serving `zone`)
    /// - `memory` and `file` host stores
    pub fn with_builtins(zone: impl Into<String>) -> Self {
        let registry = Self::new();
        registry.register_provider(
            "memory",
            Box::new(MemoryZoneProviderFactory { zone: zone.into() }),
        );
        registry.register_host_store("memory", Box::new(MemoryHostStoreFactory));
        registry.register_host_store("file", Box::new(FileHostStoreFactory));
        registry
    }

    /// Register a zone provider factory
    ///
    /// # Parameters
    ///
    /// - `name`: Provider type name (e.g., "powerdns")
    /// - `factory`: Factory object for creating provider instances
    pub fn register_provider(
        &self,
        name: impl Into<String>,
        factory: Box<dyn ZoneProviderFactory>,
    ) {
        self.providers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), factory);
    }

    /// Register a host store factory
    pub fn register_host_store(
        &self,
        name: impl Into<String>,
        factory: Box<dyn HostStoreFactory>,
    ) {
        self.host_stores
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), Arc::from(factory));
    }

    /// Create a zone provider from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn ZoneProvider>)`: Created provider instance
    /// - `Err(Error)`: If provider type is not registered or creation fails
    pub fn create_provider(&self, config: &ProviderConfig) -> Result<Box<dyn ZoneProvider>> {
        let provider_type = config.type_name();
        let providers = self
            .providers
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        let factory = providers
            .get(provider_type)
            .ok_or_else(|| Error::config(format!("Unknown provider type: {}", provider_type)))?;

        factory.create(config)
    }

    /// Create a host store from configuration
    pub async fn create_host_store(&self, config: &HostStoreConfig) -> Result<Box<dyn HostStore>> {
        let store_type = config.type_name();

        // Release the lock before calling async create
        let factory = self
            .host_stores
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(store_type)
            .cloned()
            .ok_or_else(|| Error::config(format!("Unknown host store type: {}", store_type)))?;

        factory.create(config).await
    }

    /// List all registered provider types
    pub fn list_providers(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// List all registered host store types
    pub fn list_host_stores(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .host_stores
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Check if a provider type is registered
    pub fn has_provider(&self, name: &str) -> bool {
        self.providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Check if a host store type is registered
    pub fn has_host_store(&self, name: &str) -> bool {
        self.host_stores
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }
}
