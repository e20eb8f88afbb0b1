// # Host Store Implementations
//
// This module provides implementations of the HostStore trait for
// different persistence strategies. Both share [`HostTable`], which
// carries the uniqueness rules.

pub mod file;
pub mod memory;

pub use file::{FileHostStore, FileHostStoreFactory};
pub use memory::{MemoryHostStore, MemoryHostStoreFactory};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::host::{Host, HostId, NewHost};

/// In-memory table of Hosts keyed by id
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct HostTable {
    next_id: u64,
    #[serde(with = "host_list")]
    hosts: BTreeMap<HostId, Host>,
}

impl HostTable {
    pub(crate) fn insert(&mut self, new: NewHost) -> Result<Host> {
        if self.by_hostname(&new.hostname).is_some() {
            return Err(Error::AlreadyRegistered(new.hostname));
        }
        if self.by_token(new.token.as_str()).is_some() {
            return Err(Error::host_store("token collision"));
        }

        self.next_id += 1;
        let host = new.into_host(HostId(self.next_id));
        self.hosts.insert(host.id, host.clone());
        Ok(host)
    }

    pub(crate) fn update(&mut self, host: &Host) -> Result<()> {
        match self.hosts.get_mut(&host.id) {
            Some(slot) => {
                *slot = host.clone();
                Ok(())
            }
            None => Err(Error::not_found(format!("host {}", host.hostname))),
        }
    }

    pub(crate) fn remove(&mut self, id: HostId) -> bool {
        self.hosts.remove(&id).is_some()
    }

    pub(crate) fn by_hostname(&self, hostname: &str) -> Option<&Host> {
        self.hosts.values().find(|h| h.hostname == hostname)
    }

    pub(crate) fn by_token(&self, token: &str) -> Option<&Host> {
        self.hosts.values().find(|h| h.token.as_str() == token)
    }

    pub(crate) fn all(&self) -> Vec<Host> {
        self.hosts.values().cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.hosts.len()
    }
}

/// Serialize the id map as a plain list of Hosts
mod host_list {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        hosts: &BTreeMap<HostId, Host>,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(hosts.values())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<BTreeMap<HostId, Host>, D::Error> {
        let list = Vec::<Host>::deserialize(deserializer)?;
        Ok(list.into_iter().map(|h| (h.id, h)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{SubZones, Token};

    fn new_host(hostname: &str) -> NewHost {
        NewHost {
            hostname: hostname.to_string(),
            subzones: SubZones::new(),
            ip: "192.0.2.1".parse().unwrap(),
            token: Token::generate(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn ids_are_monotonic_and_never_reused() {
        let mut table = HostTable::default();
        let a = table.insert(new_host("hosta")).unwrap();
        assert!(table.remove(a.id));
        let b = table.insert(new_host("hostb")).unwrap();
        assert!(b.id > a.id);
    }

    #[test]
    fn hostname_is_unique() {
        let mut table = HostTable::default();
        table.insert(new_host("myhome")).unwrap();
        assert!(matches!(
            table.insert(new_host("myhome")),
            Err(Error::AlreadyRegistered(_))
        ));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn update_of_removed_host_is_not_found() {
        let mut table = HostTable::default();
        let host = table.insert(new_host("myhome")).unwrap();
        table.remove(host.id);
        assert!(matches!(table.update(&host), Err(Error::NotFound(_))));
    }
}
