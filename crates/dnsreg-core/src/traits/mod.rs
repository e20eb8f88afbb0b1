//! Core traits for the registration backend
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`ZoneProvider`]: Mutate records in the authoritative DNS server
//! - [`HostStore`]: Durable storage of Host records

pub mod host_store;
pub mod zone_provider;

pub use host_store::{HostStore, HostStoreFactory};
pub use zone_provider::{RecordSet, RecordType, Zone, ZoneProvider, ZoneProviderFactory};
