//! Per-hostname mutual exclusion
//!
//! Every read → validate → remote-mutate → persist sequence runs while
//! holding the lock of the hostname it touches. Different hostnames never
//! contend: there is no global lock across operations.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::OwnedMutexGuard;

/// Guard held for the duration of one operation on a hostname
pub(crate) type HostGuard = OwnedMutexGuard<()>;

/// Table of async mutexes keyed by hostname
///
/// Entries are weak so the table only holds mutexes that somebody is
/// holding or waiting on; idle entries are pruned on the next lookup.
#[derive(Debug, Default)]
pub(crate) struct HostLocks {
    table: Mutex<HashMap<String, Weak<tokio::sync::Mutex<()>>>>,
}

impl HostLocks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `hostname`
    pub(crate) async fn lock(&self, hostname: &str) -> HostGuard {
        let mutex = {
            let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
            table.retain(|_, weak| weak.strong_count() > 0);

            match table.get(hostname).and_then(Weak::upgrade) {
                Some(mutex) => mutex,
                None => {
                    let mutex = Arc::new(tokio::sync::Mutex::new(()));
                    table.insert(hostname.to_string(), Arc::downgrade(&mutex));
                    mutex
                }
            }
        };

        mutex.lock_owned().await
    }

    /// Number of hostnames currently locked or awaited
    #[cfg(test)]
    pub(crate) fn active(&self) -> usize {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}
