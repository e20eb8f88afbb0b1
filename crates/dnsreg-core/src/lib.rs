// # dnsreg-core
//
// Core library for the dynamic-DNS registration backend.
//
// ## Architecture Overview
//
// Clients obtain a token by registering a hostname, then use it to move the
// hostname's address records, manage sub-zones and publish ACME DNS-01
// challenges. This library keeps the local registry and the authoritative
// zone consistent while doing so:
// - **HostStore**: Trait for durable storage of registrations (ownership)
// - **ZoneProvider**: Trait for the authoritative DNS server's records
// - **RegistrationEngine**: Validates, locks per hostname, mutates records, rolls back
// - **ExpirySweeper**: Periodic removal of registrations nobody refreshed
// - **BackendRegistry**: Plugin-based registry for providers and stores
//
// ## Design Principles
//
// 1. **Store is authoritative**: ownership is only ever decided by the HostStore
// 2. **No half-created Hosts**: creation failures tear everything down
// 3. **Plugin-Based**: Backends are registered dynamically, no hard-coded if-else
// 4. **Library-First**: The HTTP front end and the CLI are thin callers

pub mod config;
pub mod engine;
pub mod error;
pub mod host;
pub mod registry;
pub mod store;
pub mod sweeper;
pub mod traits;
pub mod validate;
pub mod zone;

// Re-export core types for convenience
pub use config::{EngineConfig, HostStoreConfig, ProviderConfig, RegistryConfig, SweeperConfig};
pub use engine::{EngineEvent, RegistrationEngine, RemovalReason, SweepReport};
pub use error::{Error, ErrorKind, Result};
pub use host::{Host, HostId, NewHost, SubZones, Token};
pub use registry::BackendRegistry;
pub use store::{FileHostStore, MemoryHostStore};
pub use sweeper::{ExpirySweeper, SweeperHandle};
pub use traits::{HostStore, RecordSet, RecordType, Zone, ZoneProvider};
pub use zone::MemoryZoneProvider;
