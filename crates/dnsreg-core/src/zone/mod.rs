// # Zone Provider Implementations
//
// Providers that talk to real DNS servers live in their own crates;
// this module only carries the in-memory one.

pub mod memory;

pub use memory::{MemoryZoneProvider, MemoryZoneProviderFactory};
