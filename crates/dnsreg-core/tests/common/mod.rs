//! Test doubles and common utilities for engine contract tests
//!
//! The zone double wraps the real in-memory provider so tests can assert
//! on the resulting zone, while recording every call and injecting
//! failures or latency on demand.

#![allow(dead_code)]

use dnsreg_core::error::{Error, Result};
use dnsreg_core::{
    EngineConfig, EngineEvent, MemoryHostStore, MemoryZoneProvider, RecordType,
    RegistrationEngine, Zone, ZoneProvider,
};
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

pub const ZONE: &str = "example.net";

/// One call made against the zone provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    GetZone,
    Add {
        name: String,
        record_type: RecordType,
        values: Vec<String>,
    },
    Change {
        name: String,
        record_type: RecordType,
        values: Vec<String>,
    },
    Delete {
        name: String,
        record_type: RecordType,
    },
}

impl Call {
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Call::GetZone)
    }
}

/// A ZoneProvider that records calls and fails on request
pub struct RecordingZoneProvider {
    inner: MemoryZoneProvider,
    calls: Arc<Mutex<Vec<Call>>>,
    mutation_count: Arc<AtomicUsize>,
    /// Fail every get_zone
    fail_get_zone: Arc<AtomicBool>,
    /// Fail add_record for names starting with this prefix
    fail_add_prefix: Arc<Mutex<Option<String>>>,
    /// Fail every change_record
    fail_change: Arc<AtomicBool>,
    /// Fail every delete_record
    fail_delete: Arc<AtomicBool>,
    /// Sleep before every mutation
    delay: Arc<Mutex<Duration>>,
}

impl RecordingZoneProvider {
    pub fn new(inner: MemoryZoneProvider) -> Self {
        Self {
            inner,
            calls: Arc::new(Mutex::new(Vec::new())),
            mutation_count: Arc::new(AtomicUsize::new(0)),
            fail_get_zone: Arc::new(AtomicBool::new(false)),
            fail_add_prefix: Arc::new(Mutex::new(None)),
            fail_change: Arc::new(AtomicBool::new(false)),
            fail_delete: Arc::new(AtomicBool::new(false)),
            delay: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// Create a new RecordingZoneProvider that shares state with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            inner: other.inner.clone(),
            calls: Arc::clone(&other.calls),
            mutation_count: Arc::clone(&other.mutation_count),
            fail_get_zone: Arc::clone(&other.fail_get_zone),
            fail_add_prefix: Arc::clone(&other.fail_add_prefix),
            fail_change: Arc::clone(&other.fail_change),
            fail_delete: Arc::clone(&other.fail_delete),
            delay: Arc::clone(&other.delay),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of add/change/delete calls made so far
    pub fn mutation_count(&self) -> usize {
        self.mutation_count.load(Ordering::SeqCst)
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
        self.mutation_count.store(0, Ordering::SeqCst);
    }

    pub fn fail_get_zone(&self, fail: bool) {
        self.fail_get_zone.store(fail, Ordering::SeqCst);
    }

    pub fn fail_add_for(&self, prefix: Option<&str>) {
        *self.fail_add_prefix.lock().unwrap() = prefix.map(str::to_string);
    }

    pub fn fail_change(&self, fail: bool) {
        self.fail_change.store(fail, Ordering::SeqCst);
    }

    pub fn fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    fn record(&self, call: Call) {
        if call.is_mutation() {
            self.mutation_count.fetch_add(1, Ordering::SeqCst);
        }
        self.calls.lock().unwrap().push(call);
    }

    async fn pause(&self) {
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait::async_trait]
impl ZoneProvider for RecordingZoneProvider {
    async fn get_zone(&self, zone: &str) -> Result<Zone> {
        self.record(Call::GetZone);
        if self.fail_get_zone.load(Ordering::SeqCst) {
            return Err(Error::zone_provider("injected get_zone failure"));
        }
        self.inner.get_zone(zone).await
    }

    async fn add_record(
        &self,
        zone: &str,
        name: &str,
        record_type: RecordType,
        ttl: u32,
        values: &[String],
    ) -> Result<()> {
        self.record(Call::Add {
            name: name.to_string(),
            record_type,
            values: values.to_vec(),
        });
        self.pause().await;

        let fail = self
            .fail_add_prefix
            .lock()
            .unwrap()
            .as_deref()
            .is_some_and(|prefix| name.starts_with(prefix));
        if fail {
            return Err(Error::zone_provider(format!("injected add failure for {}", name)));
        }
        self.inner
            .add_record(zone, name, record_type, ttl, values)
            .await
    }

    async fn change_record(
        &self,
        zone: &str,
        name: &str,
        record_type: RecordType,
        ttl: u32,
        values: &[String],
    ) -> Result<()> {
        self.record(Call::Change {
            name: name.to_string(),
            record_type,
            values: values.to_vec(),
        });
        self.pause().await;

        if self.fail_change.load(Ordering::SeqCst) {
            return Err(Error::zone_provider("injected change failure"));
        }
        self.inner
            .change_record(zone, name, record_type, ttl, values)
            .await
    }

    async fn delete_record(&self, zone: &str, name: &str, record_type: RecordType) -> Result<()> {
        self.record(Call::Delete {
            name: name.to_string(),
            record_type,
        });
        self.pause().await;

        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(Error::zone_provider("injected delete failure"));
        }
        self.inner.delete_record(zone, name, record_type).await
    }

    fn provider_name(&self) -> &'static str {
        "recording"
    }
}

/// Engine config used by the contract tests
pub fn test_config() -> EngineConfig {
    EngineConfig::new(ZONE)
        .with_blacklist(["bad", "admin"])
        .with_remote_timeout_secs(1)
}

pub fn ip(s: &str) -> IpAddr {
    s.parse().expect("valid IP literal")
}

/// Engine wired to an in-memory zone and store, with handles on both
pub struct Harness {
    pub engine: Arc<RegistrationEngine>,
    pub events: mpsc::Receiver<EngineEvent>,
    pub zone: MemoryZoneProvider,
    pub provider: RecordingZoneProvider,
    pub store: MemoryHostStore,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self::with_store(config, MemoryHostStore::new())
    }

    pub fn with_store(config: EngineConfig, store: MemoryHostStore) -> Self {
        let zone = MemoryZoneProvider::with_zone(ZONE);
        let provider = RecordingZoneProvider::new(zone.clone());

        let (engine, events) = RegistrationEngine::new(
            Box::new(RecordingZoneProvider::sharing_counters_with(&provider)),
            Box::new(store.clone()),
            config,
        )
        .expect("engine construction succeeds");

        Self {
            engine: Arc::new(engine),
            events,
            zone,
            provider,
            store,
        }
    }

    /// Values of the A record set at `name`
    pub async fn a(&self, name: &str) -> Option<Vec<String>> {
        self.zone.values(ZONE, name, RecordType::A).await
    }

    pub async fn aaaa(&self, name: &str) -> Option<Vec<String>> {
        self.zone.values(ZONE, name, RecordType::Aaaa).await
    }

    pub async fn txt(&self, name: &str) -> Option<Vec<String>> {
        self.zone.values(ZONE, name, RecordType::Txt).await
    }

    /// Number of record sets in the zone
    pub async fn record_count(&self) -> usize {
        self.zone.record_count(ZONE).await
    }

    /// Drain every event emitted so far
    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

pub fn values(values: &[&str]) -> Option<Vec<String>> {
    Some(values.iter().map(|s| s.to_string()).collect())
}
