//! Configuration types for the registration backend
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main registry configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Zone provider configuration
    pub provider: ProviderConfig,

    /// Host store configuration
    #[serde(default)]
    pub host_store: HostStoreConfig,

    /// Engine settings
    pub engine: EngineConfig,

    /// Expiry sweeper settings
    #[serde(default)]
    pub sweeper: SweeperConfig,
}

impl RegistryConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.engine.validate()?;
        self.provider.validate()?;
        self.host_store.validate()?;
        self.sweeper.validate()?;
        Ok(())
    }
}

/// Zone provider configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// PowerDNS HTTP API
    PowerDns {
        /// Base URL of the API (e.g., "http://127.0.0.1:8081")
        api_url: String,
        /// Value of the X-API-Key header
        api_key: String,
        /// Server id in the API path
        #[serde(default = "default_server_id")]
        server_id: String,
    },

    /// In-memory zone (not persistent)
    #[default]
    Memory,

    /// Custom provider
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProviderConfig::PowerDns {
                api_url,
                api_key,
                server_id,
            } => {
                if api_url.is_empty() {
                    return Err(crate::Error::config("PowerDNS API URL cannot be empty"));
                }
                if !api_url.starts_with("http://") && !api_url.starts_with("https://") {
                    return Err(crate::Error::config(format!(
                        "PowerDNS API URL must start with http:// or https://, got '{}'",
                        api_url
                    )));
                }
                if api_key.is_empty() {
                    return Err(crate::Error::config("PowerDNS API key cannot be empty"));
                }
                if server_id.is_empty() {
                    return Err(crate::Error::config("PowerDNS server id cannot be empty"));
                }
                Ok(())
            }
            ProviderConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom provider factory cannot be empty",
                    ));
                }
                if config.is_null() {
                    return Err(crate::Error::config(
                        "Custom provider config cannot be null",
                    ));
                }
                Ok(())
            }
            ProviderConfig::Memory => Ok(()),
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &str {
        match self {
            ProviderConfig::PowerDns { .. } => "powerdns",
            ProviderConfig::Memory => "memory",
            ProviderConfig::Custom { factory, .. } => factory,
        }
    }
}

fn default_server_id() -> String {
    "localhost".to_string()
}

/// Host store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostStoreConfig {
    /// File-based host store
    File {
        /// Path to the store file
        path: String,
    },

    /// In-memory host store (not persistent)
    #[default]
    Memory,

    /// Custom host store
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl HostStoreConfig {
    /// Validate the host store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            HostStoreConfig::File { path } if path.is_empty() => {
                Err(crate::Error::config("Host store path cannot be empty"))
            }
            HostStoreConfig::Custom { factory, .. } if factory.is_empty() => Err(
                crate::Error::config("Custom host store factory cannot be empty"),
            ),
            _ => Ok(()),
        }
    }

    /// Get the host store type name
    pub fn type_name(&self) -> &str {
        match self {
            HostStoreConfig::File { .. } => "file",
            HostStoreConfig::Memory => "memory",
            HostStoreConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Authoritative zone every hostname is registered under (e.g., "example.net")
    pub zone: String,

    /// Hostnames that can never be registered (exact match)
    #[serde(default)]
    pub blacklist: Vec<String>,

    /// Days without a successful mutation before a Host is swept
    #[serde(default = "default_expiration_days")]
    pub expiration_days: u32,

    /// TTL of every record written (in seconds)
    #[serde(default = "default_record_ttl")]
    pub record_ttl: u32,

    /// Upper bound on a single zone provider call (in seconds)
    ///
    /// A call that exceeds it counts as a provider failure and is not retried.
    #[serde(default = "default_remote_timeout_secs")]
    pub remote_timeout_secs: u64,

    /// Capacity of the engine event channel
    ///
    /// When full, new events are dropped (with a warning log).
    ///
    /// Default: 1000 events
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    /// Create a config for `zone` with every other setting at its default
    pub fn new(zone: impl Into<String>) -> Self {
        Self {
            zone: zone.into(),
            blacklist: Vec::new(),
            expiration_days: default_expiration_days(),
            record_ttl: default_record_ttl(),
            remote_timeout_secs: default_remote_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }

    /// Set the hostname deny-list
    pub fn with_blacklist<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.blacklist = names.into_iter().map(Into::into).collect();
        self
    }

    /// Set the expiration period
    pub fn with_expiration_days(mut self, days: u32) -> Self {
        self.expiration_days = days;
        self
    }

    /// Set the remote call timeout
    pub fn with_remote_timeout_secs(mut self, secs: u64) -> Self {
        self.remote_timeout_secs = secs;
        self
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.remote_timeout_secs)
    }

    /// Validate the engine configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        let zone = self.zone.trim_end_matches('.');
        if zone.is_empty() {
            return Err(crate::Error::config("Zone cannot be empty"));
        }
        if !zone.contains('.') {
            return Err(crate::Error::config(format!(
                "Zone '{}' must be a domain name such as example.net",
                self.zone
            )));
        }
        if self.expiration_days == 0 || self.expiration_days > MAX_EXPIRATION_DAYS {
            return Err(crate::Error::config(format!(
                "Expiration days must be between 1 and {}. Got: {}",
                MAX_EXPIRATION_DAYS, self.expiration_days
            )));
        }
        if self.record_ttl == 0 {
            return Err(crate::Error::config("Record TTL must be > 0"));
        }
        if self.remote_timeout_secs == 0 {
            return Err(crate::Error::config("Remote timeout must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new("")
    }
}

/// Upper bound on `expiration_days` (100 years)
pub const MAX_EXPIRATION_DAYS: u32 = 36_500;

fn default_expiration_days() -> u32 {
    30
}

fn default_record_ttl() -> u32 {
    60
}

fn default_remote_timeout_secs() -> u64 {
    10
}

fn default_event_channel_capacity() -> usize {
    1000
}

/// Expiry sweeper configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweeperConfig {
    /// Period between sweeps (in seconds); the first sweep runs at startup
    #[serde(default = "default_sweep_interval_secs")]
    pub interval_secs: u64,

    /// Whether the daemon starts the sweeper at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl SweeperConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Validate the sweeper configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.enabled && self.interval_secs == 0 {
            return Err(crate::Error::config("Sweep interval must be > 0"));
        }
        Ok(())
    }
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_sweep_interval_secs(),
            enabled: default_enabled(),
        }
    }
}

fn default_sweep_interval_secs() -> u64 {
    2 * 60 * 60
}

fn default_enabled() -> bool {
    true
}
