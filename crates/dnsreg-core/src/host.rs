//! The Host entity and its value types
//!
//! A [`Host`] is the only persistent entity: one main-zone hostname, a set
//! of sub-zone labels sharing its address, and the bearer token that proves
//! ownership.

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::net::IpAddr;

use crate::error::{Error, Result};
use crate::validate::is_valid_sub_hostname;

/// Number of random bytes in a token
const TOKEN_BYTES: usize = 16;

/// Store-assigned Host identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostId(pub u64);

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bearer secret proving ownership of a Host
///
/// The Debug implementation intentionally does NOT expose the value.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    /// Generate a fresh 128-bit token, hex-encoded
    pub fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Log-safe prefix of the token
    pub fn redacted(&self) -> String {
        let prefix: String = self.0.chars().take(4).collect();
        format!("{prefix}…")
    }
}

impl From<&str> for Token {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Token {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Token").field(&"<REDACTED>").finish()
    }
}

/// Insertion-ordered set of sub-zone labels
///
/// Order is kept for display only; equality ignores it. The comma-joined
/// form exists solely for storage and the wire.
#[derive(Debug, Clone, Default)]
pub struct SubZones(Vec<String>);

impl SubZones {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a comma-separated list, validating every label
    ///
    /// The empty string is the empty set. Any invalid entry (including an
    /// empty one, as in `"a,,b"`) fails the whole parse. Duplicates collapse.
    pub fn parse(csv: &str) -> Result<Self> {
        let mut set = Self::new();
        if csv.is_empty() {
            return Ok(set);
        }
        for label in csv.split(',') {
            if !is_valid_sub_hostname(label) {
                return Err(Error::InvalidSubHostname(label.to_string()));
            }
            set.insert(label);
        }
        Ok(set)
    }

    /// Insert a label, returning false if it was already present
    pub fn insert(&mut self, label: &str) -> bool {
        if self.contains(label) {
            return false;
        }
        self.0.push(label.to_string());
        true
    }

    pub fn contains(&self, label: &str) -> bool {
        self.0.iter().any(|l| l == label)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Labels in `self` that are not in `other`, in `self`'s order
    pub fn difference<'a>(&'a self, other: &'a SubZones) -> impl Iterator<Item = &'a str> {
        self.iter().filter(move |l| !other.contains(l))
    }

    pub fn to_csv(&self) -> String {
        self.0.join(",")
    }
}

impl PartialEq for SubZones {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|l| other.contains(l))
    }
}

impl Eq for SubZones {}

impl Serialize for SubZones {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_csv())
    }
}

impl<'de> Deserialize<'de> for SubZones {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let csv = String::deserialize(deserializer)?;
        SubZones::parse(&csv).map_err(serde::de::Error::custom)
    }
}

/// A registered hostname
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub id: HostId,
    pub hostname: String,
    pub subzones: SubZones,
    pub ip: IpAddr,
    pub token: Token,
    pub updated_at: DateTime<Utc>,
}

impl Host {
    /// Refresh `updated_at`, never moving it backwards
    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.updated_at {
            self.updated_at = now;
        }
    }

    /// Instant after which the sweeper removes this Host
    ///
    /// Saturates at the end of representable time.
    pub fn expires_at(&self, expiration_days: u32) -> DateTime<Utc> {
        self.updated_at
            .checked_add_signed(Duration::days(i64::from(expiration_days)))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// A period reaching before the start of representable time never expires
    pub fn is_expired(&self, now: DateTime<Utc>, expiration_days: u32) -> bool {
        now.checked_sub_signed(Duration::days(i64::from(expiration_days)))
            .is_some_and(|cutoff| self.updated_at < cutoff)
    }

    /// Whether `domain` is the main hostname or one of the sub-zones
    pub fn owns(&self, domain: &str) -> bool {
        domain == self.hostname || self.subzones.contains(domain)
    }
}

/// Payload for creating a Host; the store assigns the id
#[derive(Debug, Clone)]
pub struct NewHost {
    pub hostname: String,
    pub subzones: SubZones,
    pub ip: IpAddr,
    pub token: Token,
    pub updated_at: DateTime<Utc>,
}

impl NewHost {
    pub fn into_host(self, id: HostId) -> Host {
        Host {
            id,
            hostname: self.hostname,
            subzones: self.subzones,
            ip: self.ip,
            token: self.token,
            updated_at: self.updated_at,
        }
    }
}
