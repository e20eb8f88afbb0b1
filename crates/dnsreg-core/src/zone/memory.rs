// # Memory Zone Provider
//
// In-memory implementation of ZoneProvider.
//
// Serves as the reference for the provider semantics the engine relies on
// (append on add, replace on change, idempotent delete) and as the
// backing zone in tests and local development.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::ProviderConfig;
use crate::traits::zone_provider::{
    RecordSet, RecordType, Zone, ZoneProvider, ZoneProviderFactory,
};
use crate::Error;

type RecordKey = (String, RecordType);

/// In-memory zone provider
///
/// Holds any number of zones; only zones created with [`MemoryZoneProvider::with_zone`]
/// or [`MemoryZoneProvider::create_zone`] exist. Names are compared case-insensitively.
///
/// Cloning yields another handle onto the same zones.
#[derive(Debug, Clone, Default)]
pub struct MemoryZoneProvider {
    zones: Arc<RwLock<BTreeMap<String, BTreeMap<RecordKey, RecordSet>>>>,
}

fn canonical(name: &str) -> String {
    name.trim_end_matches('.').to_ascii_lowercase()
}

impl MemoryZoneProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a provider holding one empty zone
    pub fn with_zone(zone: &str) -> Self {
        let provider = Self::new();
        provider
            .zones
            .try_write()
            .map(|mut zones| zones.insert(canonical(zone), BTreeMap::new()))
            .ok();
        provider
    }

    pub async fn create_zone(&self, zone: &str) {
        self.zones
            .write()
            .await
            .entry(canonical(zone))
            .or_default();
    }

    /// Values of a record set, if present
    pub async fn values(&self, zone: &str, name: &str, record_type: RecordType) -> Option<Vec<String>> {
        self.zones
            .read()
            .await
            .get(&canonical(zone))?
            .get(&(canonical(name), record_type))
            .map(|rr| rr.values.clone())
    }

    /// Number of record sets in a zone
    pub async fn record_count(&self, zone: &str) -> usize {
        self.zones
            .read()
            .await
            .get(&canonical(zone))
            .map_or(0, BTreeMap::len)
    }
}

#[async_trait]
impl ZoneProvider for MemoryZoneProvider {
    async fn get_zone(&self, zone: &str) -> Result<Zone, Error> {
        let zones = self.zones.read().await;
        let records = zones
            .get(&canonical(zone))
            .ok_or_else(|| Error::not_found(format!("Zone not found: {}", zone)))?;

        Ok(Zone {
            name: canonical(zone),
            rrsets: records.values().cloned().collect(),
        })
    }

    async fn add_record(
        &self,
        zone: &str,
        name: &str,
        record_type: RecordType,
        ttl: u32,
        values: &[String],
    ) -> Result<(), Error> {
        let mut zones = self.zones.write().await;
        let records = zones
            .get_mut(&canonical(zone))
            .ok_or_else(|| Error::not_found(format!("Zone not found: {}", zone)))?;

        let rr = records
            .entry((canonical(name), record_type))
            .or_insert_with(|| RecordSet {
                name: canonical(name),
                record_type,
                ttl,
                values: Vec::new(),
            });
        rr.ttl = ttl;
        if !record_type.accumulates() {
            rr.values.clear();
        }
        for value in values {
            if !rr.values.contains(value) {
                rr.values.push(value.clone());
            }
        }
        Ok(())
    }

    async fn change_record(
        &self,
        zone: &str,
        name: &str,
        record_type: RecordType,
        ttl: u32,
        values: &[String],
    ) -> Result<(), Error> {
        let mut zones = self.zones.write().await;
        let records = zones
            .get_mut(&canonical(zone))
            .ok_or_else(|| Error::not_found(format!("Zone not found: {}", zone)))?;

        records.insert(
            (canonical(name), record_type),
            RecordSet {
                name: canonical(name),
                record_type,
                ttl,
                values: values.to_vec(),
            },
        );
        Ok(())
    }

    async fn delete_record(
        &self,
        zone: &str,
        name: &str,
        record_type: RecordType,
    ) -> Result<(), Error> {
        let mut zones = self.zones.write().await;
        let records = zones
            .get_mut(&canonical(zone))
            .ok_or_else(|| Error::not_found(format!("Zone not found: {}", zone)))?;

        records.remove(&(canonical(name), record_type));
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "memory"
    }
}

/// Factory for the `memory` provider type
///
/// Each created provider starts with the given zone and no records.
pub struct MemoryZoneProviderFactory {
    pub zone: String,
}

impl ZoneProviderFactory for MemoryZoneProviderFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Box<dyn ZoneProvider>, Error> {
        match config {
            ProviderConfig::Memory => Ok(Box::new(MemoryZoneProvider::with_zone(&self.zone))),
            _ => Err(Error::config("Invalid config for memory zone provider")),
        }
    }
}
