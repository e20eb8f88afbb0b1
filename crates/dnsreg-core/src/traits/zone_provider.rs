// # Zone Provider Trait
//
// Defines the interface to the authoritative DNS server that actually
// serves the registered names.
//
// ## Implementations
//
// - In-memory: `MemoryZoneProvider` (tests, local development)
// - PowerDNS: `dnsreg-provider-powerdns` crate
//
// ## Usage
//
// ```rust,ignore
// use dnsreg_core::{RecordType, ZoneProvider};
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let provider = /* ZoneProvider implementation */;
//
//     provider.add_record(
//         "example.net",
//         "myhome.example.net",
//         RecordType::A,
//         60,
//         &["192.0.2.10".to_string()],
//     ).await?;
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// Resource record types written by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    /// IPv4 address record
    A,
    /// IPv6 address record
    Aaaa,
    /// Text record (ACME DNS-01 challenges)
    Txt,
}

impl RecordType {
    /// Address record type matching the IP family
    pub fn for_address(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => RecordType::A,
            IpAddr::V6(_) => RecordType::Aaaa,
        }
    }

    /// Whether `add_record` keeps existing values of this type
    ///
    /// TXT sets accumulate so concurrent challenges coexist; an address set
    /// holds one address, so a leftover value is overwritten.
    pub fn accumulates(&self) -> bool {
        matches!(self, RecordType::Txt)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Txt => "TXT",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One (name, type) record set in a zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSet {
    /// Fully-qualified name, no trailing dot
    pub name: String,
    pub record_type: RecordType,
    pub ttl: u32,
    pub values: Vec<String>,
}

impl fmt::Display for RecordSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}",
            self.name,
            self.record_type,
            self.ttl,
            self.values.first().map(String::as_str).unwrap_or("")
        )
    }
}

/// Snapshot of a zone's record sets
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub name: String,
    pub rrsets: Vec<RecordSet>,
}

impl Zone {
    /// Look up a record set by name (case-insensitive) and type
    pub fn find(&self, name: &str, record_type: RecordType) -> Option<&RecordSet> {
        self.rrsets
            .iter()
            .find(|rr| rr.record_type == record_type && rr.name.eq_ignore_ascii_case(name))
    }

    /// All record sets of the given type
    pub fn of_type(&self, record_type: RecordType) -> impl Iterator<Item = &RecordSet> {
        self.rrsets
            .iter()
            .filter(move |rr| rr.record_type == record_type)
    }

    /// Distinct owner names, in zone order
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for rr in &self.rrsets {
            if !names.iter().any(|n| n.eq_ignore_ascii_case(&rr.name)) {
                names.push(&rr.name);
            }
        }
        names
    }
}

/// Trait for authoritative zone backends
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Semantics
///
/// The engine treats a provider as immediately and strongly consistent.
///
/// - `add_record` on an existing TXT set appends values that are not
///   already present; on an address set it replaces the values
///   (see [`RecordType::accumulates`])
/// - `change_record` replaces the set, creating it if missing
/// - `delete_record` of a missing set succeeds
///
/// # Forbidden Capabilities
/// - ❌ Retry logic (a failure is reported once; the engine decides)
/// - ❌ Access to the host store
/// - ❌ Ownership decisions (the engine checks tokens before calling)
#[async_trait]
pub trait ZoneProvider: Send + Sync {
    /// Fetch the current record sets of a zone
    ///
    /// Also serves as the reachability check the engine performs before
    /// mutating anything.
    async fn get_zone(&self, zone: &str) -> Result<Zone, crate::Error>;

    /// Add values to a record set
    async fn add_record(
        &self,
        zone: &str,
        name: &str,
        record_type: RecordType,
        ttl: u32,
        values: &[String],
    ) -> Result<(), crate::Error>;

    /// Replace a record set
    async fn change_record(
        &self,
        zone: &str,
        name: &str,
        record_type: RecordType,
        ttl: u32,
        values: &[String],
    ) -> Result<(), crate::Error>;

    /// Delete a record set
    async fn delete_record(
        &self,
        zone: &str,
        name: &str,
        record_type: RecordType,
    ) -> Result<(), crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing zone providers from configuration
pub trait ZoneProviderFactory: Send + Sync {
    /// Create a ZoneProvider instance from configuration
    fn create(
        &self,
        config: &crate::config::ProviderConfig,
    ) -> Result<Box<dyn ZoneProvider>, crate::Error>;
}
