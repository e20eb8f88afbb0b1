//! Registration engine
//!
//! The RegistrationEngine is responsible for:
//! - Validating hostnames, sub-zone labels and tokens
//! - Keeping the HostStore and the zone served by the ZoneProvider consistent
//! - Rolling back half-created registrations
//! - Publishing and clearing ACME DNS-01 challenge records
//!
//! ## Architecture
//!
//! ```text
//!   register / update / delete / challenge / expire
//!                         │
//!                         ▼
//!               ┌──────────────────┐
//!               │ RegistrationEngine│── per-hostname lock
//!               └──────────────────┘
//!                         │
//!         ┌───────────────┼────────────────────┐
//!         │               │                    │
//!         ▼               ▼                    ▼
//! ┌─────────────┐  ┌──────────────┐     ┌─────────────┐
//! │ HostStore   │  │ ZoneProvider │     │   Events    │
//! │ (ownership) │  │ (records)    │     │  (notify)   │
//! └─────────────┘  └──────────────┘     └─────────────┘
//! ```
//!
//! ## Failure Policy
//!
//! - Creation and sub-zone addition are all-or-nothing: a failed record add
//!   tears the whole Host down before the error is returned
//! - Address changes and challenge cleanup are best-effort: failures are
//!   logged and the operation still succeeds once the store is updated
//! - Teardown tolerates every remote failure; only the store delete is fatal

mod locks;

use chrono::{DateTime, Utc};
use std::future::Future;
use std::net::IpAddr;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::host::{Host, NewHost, SubZones, Token};
use crate::traits::{HostStore, RecordSet, RecordType, ZoneProvider};
use crate::validate::check_hostname;
use locks::{HostGuard, HostLocks};

/// Label prefix of DNS-01 challenge records
const ACME_CHALLENGE_LABEL: &str = "_acme-challenge";

/// Why a Host was removed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    /// Delete called with the Host's token
    Deleted,
    /// Swept after `expiration_days` without a mutation
    Expired,
    /// Creation or sub-zone addition failed part way
    RolledBack,
}

/// Events emitted by the RegistrationEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// New Host created and all its records published
    HostRegistered {
        hostname: String,
        ip: IpAddr,
        subzones: Vec<String>,
    },

    /// Re-register changed the sub-zone set
    SubZonesChanged {
        hostname: String,
        added: Vec<String>,
        removed: Vec<String>,
    },

    /// Update moved the Host to a new address
    AddressChanged {
        hostname: String,
        previous_ip: IpAddr,
        new_ip: IpAddr,
    },

    /// Host refreshed without any record change
    Heartbeat { hostname: String },

    /// Host and its records removed
    HostRemoved {
        hostname: String,
        reason: RemovalReason,
    },

    /// Challenge TXT record published
    ChallengePublished { hostname: String, name: String },

    /// Challenge TXT record removed
    ChallengeCleared { hostname: String, name: String },
}

/// Outcome of one expiry pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Hosts examined
    pub scanned: usize,
    /// Hosts removed
    pub expired: usize,
    /// Expired Hosts whose removal failed
    pub failed: usize,
}

/// Core registration engine
///
/// Owns the only path by which Hosts and their records change. Callers
/// are the transport layer (one call per request), the admin CLI and the
/// [`ExpirySweeper`](crate::ExpirySweeper).
///
/// ## Lifecycle
///
/// 1. Create with [`RegistrationEngine::new()`]
/// 2. Share behind an `Arc` between request handlers and the sweeper
/// 3. Call [`RegistrationEngine::flush()`] before exiting
///
/// ## Concurrency
///
/// Operations on the same hostname are serialized for their whole
/// read → remote mutation → persist sequence. Operations on different
/// hostnames run fully in parallel.
pub struct RegistrationEngine {
    /// Zone provider serving the records
    provider: Box<dyn ZoneProvider>,

    /// Host store, the source of truth for ownership
    store: Box<dyn HostStore>,

    /// Authoritative zone, lowercase without trailing dot
    zone: String,

    /// Hostnames that can never be registered
    blacklist: Vec<String>,

    expiration_days: u32,

    record_ttl: u32,

    /// Deadline for each single provider call
    remote_timeout: Duration,

    locks: HostLocks,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl RegistrationEngine {
    /// Create a new registration engine
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        provider: Box<dyn ZoneProvider>,
        store: Box<dyn HostStore>,
        config: EngineConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let engine = Self {
            provider,
            store,
            zone: config.zone.trim_end_matches('.').to_ascii_lowercase(),
            remote_timeout: config.remote_timeout(),
            blacklist: config.blacklist,
            expiration_days: config.expiration_days,
            record_ttl: config.record_ttl,
            locks: HostLocks::new(),
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    pub fn zone(&self) -> &str {
        &self.zone
    }

    pub fn expiration_days(&self) -> u32 {
        self.expiration_days
    }

    /// Fully-qualified name of a Host's main record
    pub fn fqdn(&self, host: &Host) -> String {
        format!("{}.{}", host.hostname, self.zone)
    }

    /// Register a hostname, or re-register it with its token
    ///
    /// With an empty `token` a new Host is created at `requester_ip` and its
    /// freshly generated token is returned. With a token, the stored
    /// sub-zone set is reconciled with `subzones` and the same token is
    /// returned; the address is left alone (that is what `update` is for).
    ///
    /// # Errors
    ///
    /// - `BadInput`, `InvalidHostname`, `Blacklisted`, `InvalidSubHostname`:
    ///   rejected before any store or remote access
    /// - `AlreadyRegistered`: empty token and the hostname is taken
    /// - `WrongToken`: the token does not belong to this hostname
    /// - `Internal`: zone unreachable, or a record add failed and the Host
    ///   was torn down
    pub async fn register(
        &self,
        hostname: &str,
        subzones: &str,
        token: &str,
        requester_ip: IpAddr,
    ) -> Result<Token> {
        check_hostname(hostname, &self.blacklist).inspect_err(|e| {
            warn!("Rejected registration of {:?}: {}", hostname, e);
        })?;
        let requested = SubZones::parse(subzones).inspect_err(|e| {
            warn!("Rejected registration of {}: {}", hostname, e);
        })?;

        let _guard = self.locks.lock(hostname).await;
        let existing = self.store.find_by_hostname(hostname).await?;

        if token.is_empty() {
            if existing.is_some() {
                info!("Host {} already registered", hostname);
                return Err(Error::AlreadyRegistered(hostname.to_string()));
            }
            self.preflight().await?;
            self.create(hostname, requested, requester_ip).await
        } else {
            let host = match existing {
                Some(host) if host.token.as_str() == token => host,
                _ => {
                    warn!(
                        "Wrong token {} for host {}",
                        Token::from(token).redacted(),
                        hostname
                    );
                    return Err(Error::WrongToken);
                }
            };
            self.preflight().await?;
            self.reconcile_subzones(host, requested).await
        }
    }

    /// Point a Host (and every sub-zone) at `requester_ip`
    ///
    /// Also the heartbeat: an unchanged address only refreshes `updated_at`.
    /// Record changes are best-effort; the new address is persisted even if
    /// some of them fail.
    pub async fn update(&self, token: &str, requester_ip: IpAddr) -> Result<()> {
        let (mut host, _guard) = self.lock_by_token(token).await?;

        // Fail-open: the zone check only informs the log here
        if let Err(e) = self.remote(self.provider.get_zone(&self.zone)).await {
            warn!(
                "Zone {} unavailable, updating {} anyway: {}",
                self.zone, host.hostname, e
            );
        }

        let event = if host.ip != requester_ip {
            let previous_ip = host.ip;
            let old_type = RecordType::for_address(&previous_ip);
            let new_type = RecordType::for_address(&requester_ip);
            let values = [requester_ip.to_string()];

            for name in self.address_names(&host) {
                if old_type != new_type {
                    self.delete_best_effort(&name, old_type).await;
                }
                debug!("Changing {} {} -> {}", name, new_type, requester_ip);
                if let Err(e) = self
                    .remote(self.provider.change_record(
                        &self.zone,
                        &name,
                        new_type,
                        self.record_ttl,
                        &values,
                    ))
                    .await
                {
                    warn!("Failed to change {} to {}: {}", name, requester_ip, e);
                }
            }

            host.ip = requester_ip;
            info!(
                "Updated {} {} -> {}",
                self.fqdn(&host),
                previous_ip,
                requester_ip
            );
            EngineEvent::AddressChanged {
                hostname: host.hostname.clone(),
                previous_ip,
                new_ip: requester_ip,
            }
        } else {
            debug!("Heartbeat from {} at {}", host.hostname, requester_ip);
            EngineEvent::Heartbeat {
                hostname: host.hostname.clone(),
            }
        };

        host.touch(Utc::now());
        self.persist(&host).await?;
        self.emit_event(event);
        Ok(())
    }

    /// Remove a Host and all of its records
    pub async fn delete(&self, token: &str) -> Result<()> {
        let (host, _guard) = self.lock_by_token(token).await?;
        self.teardown(&host, RemovalReason::Deleted).await
    }

    /// Publish a DNS-01 challenge value for `domain`
    ///
    /// `domain` is the Host's hostname or one of its sub-zone labels.
    /// Values accumulate: two challenges for the same name coexist.
    pub async fn add_challenge_record(&self, token: &str, domain: &str, value: &str) -> Result<()> {
        let (host, _guard) = self.lock_by_token(token).await?;

        if domain.is_empty() || value.is_empty() {
            return Err(Error::bad_input("challenge domain and value are required"));
        }
        let name = self.challenge_name(&host, domain)?;

        self.remote(self.provider.add_record(
            &self.zone,
            &name,
            RecordType::Txt,
            self.record_ttl,
            &[value.to_string()],
        ))
        .await
        .map_err(|e| {
            error!("Failed to publish challenge {}: {}", name, e);
            Error::internal(format!("failed to publish challenge {}: {}", name, e))
        })?;

        info!("Published challenge {}", name);
        self.emit_event(EngineEvent::ChallengePublished {
            hostname: host.hostname,
            name,
        });
        Ok(())
    }

    /// Remove the DNS-01 challenge record of `domain` (best-effort)
    pub async fn remove_challenge_record(&self, token: &str, domain: &str) -> Result<()> {
        let (host, _guard) = self.lock_by_token(token).await?;

        if domain.is_empty() {
            return Err(Error::bad_input("challenge domain is required"));
        }
        let name = self.challenge_name(&host, domain)?;

        if self.delete_best_effort(&name, RecordType::Txt).await {
            info!("Cleared challenge {}", name);
            self.emit_event(EngineEvent::ChallengeCleared {
                hostname: host.hostname,
                name,
            });
        }
        Ok(())
    }

    /// All registered Hosts
    pub async fn hosts(&self) -> Result<Vec<Host>> {
        self.store.find_all().await
    }

    /// Zone record sets belonging to a Host: address records of the main
    /// name and sub-zones, plus any challenge TXT records
    pub async fn host_records(&self, host: &Host) -> Result<Vec<RecordSet>> {
        let zone = self.remote(self.provider.get_zone(&self.zone)).await?;

        let mut names = self.address_names(host);
        names.extend(self.challenge_names(host));

        Ok(zone
            .rrsets
            .into_iter()
            .filter(|rr| names.iter().any(|n| n.eq_ignore_ascii_case(&rr.name)))
            .collect())
    }

    /// Run one expiry pass: remove every Host not mutated for
    /// `expiration_days` before `now`
    ///
    /// A failure on one Host never stops the pass. Only a failure to list
    /// the Hosts at all is returned.
    pub async fn expire(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let hosts = self.store.find_all().await?;
        let mut report = SweepReport {
            scanned: hosts.len(),
            ..SweepReport::default()
        };

        for candidate in hosts {
            if !candidate.is_expired(now, self.expiration_days) {
                continue;
            }

            let _guard = self.locks.lock(&candidate.hostname).await;
            // Re-read under the lock: a heartbeat may have landed meanwhile
            let host = match self.store.find_by_token(candidate.token.as_str()).await {
                Ok(Some(host)) if host.is_expired(now, self.expiration_days) => host,
                Ok(_) => continue,
                Err(e) => {
                    warn!("Failed to reload {}: {}", candidate.hostname, e);
                    report.failed += 1;
                    continue;
                }
            };

            info!(
                "Host {} has expired (last update {})",
                host.hostname, host.updated_at
            );
            match self.teardown(&host, RemovalReason::Expired).await {
                Ok(()) => report.expired += 1,
                Err(e) => {
                    error!("Failed to remove expired host {}: {}", host.hostname, e);
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Persist any pending host store changes
    pub async fn flush(&self) -> Result<()> {
        self.store.flush().await
    }

    async fn create(&self, hostname: &str, subzones: SubZones, ip: IpAddr) -> Result<Token> {
        let new = NewHost {
            hostname: hostname.to_string(),
            subzones,
            ip,
            token: Token::generate(),
            updated_at: Utc::now(),
        };
        let host = self.store.create(new).await?;

        for name in self.address_names(&host) {
            if let Err(e) = self.add_address(&name, ip).await {
                error!(
                    "Failed to add {}: {}. Rolling back {}",
                    name, e, host.hostname
                );
                self.rollback(&host).await;
                return Err(Error::internal(format!("failed to add record {}: {}", name, e)));
            }
        }

        info!(
            "Registered {} -> {} with token {}",
            self.fqdn(&host),
            ip,
            host.token.redacted()
        );
        self.emit_event(EngineEvent::HostRegistered {
            hostname: host.hostname.clone(),
            ip,
            subzones: host.subzones.iter().map(str::to_string).collect(),
        });
        Ok(host.token)
    }

    async fn reconcile_subzones(&self, mut host: Host, requested: SubZones) -> Result<Token> {
        let removed: Vec<String> = host
            .subzones
            .difference(&requested)
            .map(str::to_string)
            .collect();
        let added: Vec<String> = requested
            .difference(&host.subzones)
            .map(str::to_string)
            .collect();

        let event = if removed.is_empty() && added.is_empty() {
            debug!("Sub-zones of {} unchanged", host.hostname);
            EngineEvent::Heartbeat {
                hostname: host.hostname.clone(),
            }
        } else {
            let record_type = RecordType::for_address(&host.ip);
            for sub in &removed {
                let name = self.subzone_fqdn(&host.hostname, sub);
                self.delete_best_effort(&name, record_type).await;
            }

            for sub in &added {
                let name = self.subzone_fqdn(&host.hostname, sub);
                if let Err(e) = self.add_address(&name, host.ip).await {
                    error!(
                        "Failed to add {}: {}. Rolling back {}",
                        name, e, host.hostname
                    );
                    // Cover labels added in this call as well as the stored ones
                    let mut doomed = host.clone();
                    for sub in &added {
                        doomed.subzones.insert(sub);
                    }
                    self.rollback(&doomed).await;
                    return Err(Error::internal(format!(
                        "failed to add record {}: {}",
                        name, e
                    )));
                }
            }

            info!(
                "Sub-zones of {} now [{}] (added {:?}, removed {:?})",
                host.hostname,
                requested.to_csv(),
                added,
                removed
            );
            host.subzones = requested;
            EngineEvent::SubZonesChanged {
                hostname: host.hostname.clone(),
                added,
                removed,
            }
        };

        host.touch(Utc::now());
        self.persist(&host).await?;
        self.emit_event(event);
        Ok(host.token)
    }

    /// Best-effort removal of everything a Host owns, then its store row
    async fn teardown(&self, host: &Host, reason: RemovalReason) -> Result<()> {
        let challenges = self.challenge_names(host);
        let stale: Vec<String> = match self.remote(self.provider.get_zone(&self.zone)).await {
            Ok(zone) => zone
                .of_type(RecordType::Txt)
                .filter(|rr| challenges.iter().any(|c| c.eq_ignore_ascii_case(&rr.name)))
                .map(|rr| rr.name.clone())
                .collect(),
            Err(e) => {
                warn!(
                    "Unable to list zone {} while removing {}: {}",
                    self.zone, host.hostname, e
                );
                challenges
            }
        };
        for name in &stale {
            self.delete_best_effort(name, RecordType::Txt).await;
        }

        let record_type = RecordType::for_address(&host.ip);
        for sub in host.subzones.iter() {
            let name = self.subzone_fqdn(&host.hostname, sub);
            self.delete_best_effort(&name, record_type).await;
        }
        self.delete_best_effort(&self.fqdn(host), record_type).await;

        self.store.delete(host).await.inspect_err(|e| {
            error!("Failed to remove {} from host store: {}", host.hostname, e);
        })?;

        info!("Removed {} ({:?})", self.fqdn(host), reason);
        self.emit_event(EngineEvent::HostRemoved {
            hostname: host.hostname.clone(),
            reason,
        });
        Ok(())
    }

    async fn rollback(&self, host: &Host) {
        if let Err(e) = self.teardown(host, RemovalReason::RolledBack).await {
            error!("Rollback of {} incomplete: {}", host.hostname, e);
        }
    }

    /// Resolve a token and lock its hostname
    ///
    /// The token is resolved again under the lock; a Host deleted while we
    /// waited yields `UnknownToken`.
    async fn lock_by_token(&self, token: &str) -> Result<(Host, HostGuard)> {
        if token.is_empty() {
            return Err(Error::UnknownToken);
        }

        let Some(host) = self.store.find_by_token(token).await? else {
            debug!("Unknown token {}", Token::from(token).redacted());
            return Err(Error::UnknownToken);
        };

        let guard = self.locks.lock(&host.hostname).await;
        match self.store.find_by_token(token).await? {
            Some(current) if current.hostname == host.hostname => Ok((current, guard)),
            _ => {
                debug!("Host {} removed while waiting", host.hostname);
                Err(Error::UnknownToken)
            }
        }
    }

    async fn persist(&self, host: &Host) -> Result<()> {
        match self.store.save(host).await {
            Err(Error::NotFound(_)) => Err(Error::UnknownToken),
            other => other,
        }
    }

    async fn preflight(&self) -> Result<()> {
        self.remote(self.provider.get_zone(&self.zone))
            .await
            .map(|_| ())
            .map_err(|e| {
                error!("Zone {} unavailable: {}", self.zone, e);
                Error::internal(format!("zone {} unavailable: {}", self.zone, e))
            })
    }

    async fn add_address(&self, name: &str, ip: IpAddr) -> Result<()> {
        debug!("Adding {} {} {}", name, RecordType::for_address(&ip), ip);
        self.remote(self.provider.add_record(
            &self.zone,
            name,
            RecordType::for_address(&ip),
            self.record_ttl,
            &[ip.to_string()],
        ))
        .await
    }

    /// Delete a record set, logging failure; returns whether it succeeded
    async fn delete_best_effort(&self, name: &str, record_type: RecordType) -> bool {
        debug!("Deleting {} {}", name, record_type);
        match self
            .remote(self.provider.delete_record(&self.zone, name, record_type))
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to delete {} {}: {}", name, record_type, e);
                false
            }
        }
    }

    /// Run one provider call under the remote timeout
    async fn remote<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.remote_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(Error::provider(self.provider.provider_name(), e.to_string())),
            Err(_) => Err(Error::timeout(format!(
                "{} call exceeded {:?}",
                self.provider.provider_name(),
                self.remote_timeout
            ))),
        }
    }

    fn subzone_fqdn(&self, hostname: &str, sub: &str) -> String {
        format!("{}.{}.{}", sub, hostname, self.zone)
    }

    /// Main name first, then every sub-zone
    fn address_names(&self, host: &Host) -> Vec<String> {
        let mut names = vec![self.fqdn(host)];
        names.extend(
            host.subzones
                .iter()
                .map(|sub| self.subzone_fqdn(&host.hostname, sub)),
        );
        names
    }

    fn challenge_names(&self, host: &Host) -> Vec<String> {
        self.address_names(host)
            .into_iter()
            .map(|name| format!("{}.{}", ACME_CHALLENGE_LABEL, name))
            .collect()
    }

    fn challenge_name(&self, host: &Host, domain: &str) -> Result<String> {
        if !host.owns(domain) {
            warn!("Domain {} not registered for host {}", domain, host.hostname);
            return Err(Error::DomainNotOwned(domain.to_string()));
        }

        let owner = if domain == host.hostname {
            self.fqdn(host)
        } else {
            self.subzone_fqdn(&host.hostname, domain)
        };
        Ok(format!("{}.{}", ACME_CHALLENGE_LABEL, owner))
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            // Nobody listening
            Err(TrySendError::Closed(_)) => {}
        }
    }
}
