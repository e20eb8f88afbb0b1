// # PowerDNS Zone Provider
//
// This crate provides a ZoneProvider backed by the PowerDNS authoritative
// server HTTP API.
//
// ## Behavior
//
// - ✅ One HTTP round trip per operation (two for a TXT `add_record`: read, then replace)
// - ✅ Full error propagation to the engine (the engine decides on rollback)
// - ✅ HTTP timeout configured (30 seconds)
// - ✅ Specific error handling for HTTP status codes (401, 403, 404, 422, 429, 5xx)
// - ✅ Dry-run mode for safe testing
// - ✅ A, AAAA and TXT record sets
// - ❌ NO retry logic (a failure is reported once)
// - ❌ NO caching (every call reads the live zone)
// - ❌ NO background tasks
//
// ## Security Requirements
//
// - API key NEVER appears in logs or Debug output
// - Provider MUST fail fast if the key is empty
//
// ## API Reference
//
// - Get zone: GET `/api/v1/servers/:server_id/zones/:zone`
// - Modify record sets: PATCH `/api/v1/servers/:server_id/zones/:zone`
//   with `changetype` REPLACE or DELETE
// - Names are absolute (trailing dot); TXT contents are quoted strings

use async_trait::async_trait;
use dnsreg_core::config::ProviderConfig;
use dnsreg_core::traits::ZoneProviderFactory;
use dnsreg_core::{BackendRegistry, Error, RecordSet, RecordType, Result, Zone, ZoneProvider};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const PROVIDER_NAME: &str = "powerdns";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Environment variable selecting dry-run mode
const MODE_ENV: &str = "DNSREG_MODE";

/// PowerDNS zone provider
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the provider will:
/// - Perform all GET requests (zone reads)
/// - Log the intended PATCH payload
/// - **NOT** actually modify the zone
///
/// # Security
///
/// The Debug implementation intentionally does NOT expose the API key.
pub struct PowerDnsProvider {
    /// API base URL without trailing slash
    api_url: String,

    /// X-API-Key value
    /// ⚠️ NEVER log this value
    api_key: String,

    server_id: String,

    client: reqwest::Client,

    dry_run: bool,
}

impl std::fmt::Debug for PowerDnsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PowerDnsProvider")
            .field("api_url", &self.api_url)
            .field("api_key", &"<REDACTED>")
            .field("server_id", &self.server_id)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl PowerDnsProvider {
    /// Create a new PowerDNS provider
    ///
    /// # Parameters
    ///
    /// - `api_url`: Base URL of the API (e.g., "http://127.0.0.1:8081")
    /// - `api_key`: Value of the webserver's `api-key` setting
    /// - `server_id`: Server id in the API path (usually "localhost")
    /// - `dry_run`: If true, perform reads but skip PATCH requests
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        server_id: impl Into<String>,
        dry_run: bool,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(Error::config("PowerDNS API key cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            api_key,
            server_id: server_id.into(),
            client,
            dry_run,
        })
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn zone_url(&self, zone: &str) -> String {
        format!(
            "{}/api/v1/servers/{}/zones/{}",
            self.api_url,
            self.server_id,
            absolute(zone)
        )
    }

    /// Fetch the zone document
    ///
    /// ```http
    /// GET /api/v1/servers/localhost/zones/example.net.
    /// X-API-Key: <key>
    /// ```
    async fn fetch_zone(&self, zone: &str) -> Result<ZoneDocument> {
        let url = self.zone_url(zone);
        tracing::debug!("Fetching zone {}", zone);

        let response = self
            .client
            .get(&url)
            .header("X-API-Key", &self.api_key)
            .send()
            .await
            .map_err(|e| Error::provider(PROVIDER_NAME, format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(status_error(status, &body, &format!("zone {}", zone)));
        }

        response
            .json()
            .await
            .map_err(|e| Error::provider(PROVIDER_NAME, format!("Failed to parse zone: {}", e)))
    }

    /// Apply one record set change
    ///
    /// ```http
    /// PATCH /api/v1/servers/localhost/zones/example.net.
    /// X-API-Key: <key>
    /// { "rrsets": [ { "name": "...", "type": "A", "changetype": "REPLACE", ... } ] }
    /// ```
    async fn patch(&self, zone: &str, change: RrsetChange) -> Result<()> {
        let url = self.zone_url(zone);
        let body = PatchBody {
            rrsets: vec![change],
        };

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send PATCH request to {} with payload: {}",
                url,
                serde_json::to_string(&body).unwrap_or_default()
            );
            return Ok(());
        }

        let response = self
            .client
            .patch(&url)
            .header("X-API-Key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::provider(PROVIDER_NAME, format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            let rrset = &body.rrsets[0];
            return Err(status_error(
                status,
                &text,
                &format!("{} {} {}", rrset.changetype, rrset.name, rrset.record_type),
            ));
        }

        Ok(())
    }
}

#[async_trait]
impl ZoneProvider for PowerDnsProvider {
    async fn get_zone(&self, zone: &str) -> Result<Zone> {
        Ok(self.fetch_zone(zone).await?.into_zone())
    }

    async fn add_record(
        &self,
        zone: &str,
        name: &str,
        record_type: RecordType,
        ttl: u32,
        values: &[String],
    ) -> Result<()> {
        // PATCH can only replace a set: TXT values are merged with what is there
        let merged = if record_type.accumulates() {
            let current = self.fetch_zone(zone).await?.into_zone();
            merge_values(current.find(&relative(name), record_type), values)
        } else {
            values.to_vec()
        };

        tracing::info!(
            "{} {} {} ({} values)",
            if self.dry_run { "Would add" } else { "Adding" },
            name,
            record_type,
            merged.len()
        );
        self.patch(zone, RrsetChange::replace(name, record_type, ttl, &merged))
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
        tracing::info!(
            "{} {} {} -> {:?}",
            if self.dry_run { "Would change" } else { "Changing" },
            name,
            record_type,
            values
        );
        self.patch(zone, RrsetChange::replace(name, record_type, ttl, values))
            .await
    }

    async fn delete_record(&self, zone: &str, name: &str, record_type: RecordType) -> Result<()> {
        tracing::info!(
            "{} {} {}",
            if self.dry_run { "Would delete" } else { "Deleting" },
            name,
            record_type
        );
        self.patch(zone, RrsetChange::delete(name, record_type)).await
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}

/// Existing values followed by the new ones not already present
fn merge_values(current: Option<&RecordSet>, values: &[String]) -> Vec<String> {
    let mut merged = current.map(|rr| rr.values.clone()).unwrap_or_default();
    for value in values {
        if !merged.contains(value) {
            merged.push(value.clone());
        }
    }
    merged
}

/// Map a non-success HTTP status to an error
fn status_error(status: u16, body: &str, what: &str) -> Error {
    match status {
        401 | 403 => Error::provider(
            PROVIDER_NAME,
            format!(
                "Authentication failed: invalid API key or insufficient permissions. Status: {}",
                status
            ),
        ),
        404 => Error::not_found(format!("Not found: {}", what)),
        422 => Error::provider(
            PROVIDER_NAME,
            format!("Rejected as invalid: {} - {}", what, body),
        ),
        429 => Error::provider(
            PROVIDER_NAME,
            format!("Rate limit exceeded. Please retry later. Status: {}", status),
        ),
        500..=599 => Error::provider(
            PROVIDER_NAME,
            format!("PowerDNS server error (transient): {} - {}", status, body),
        ),
        _ => Error::provider(
            PROVIDER_NAME,
            format!("Request for {} failed: {} - {}", what, status, body),
        ),
    }
}

/// Name with exactly one trailing dot
fn absolute(name: &str) -> String {
    format!("{}.", name.trim_end_matches('.'))
}

/// Name without trailing dot, lowercased
fn relative(name: &str) -> String {
    name.trim_end_matches('.').to_ascii_lowercase()
}

fn parse_type(record_type: &str) -> Option<RecordType> {
    match record_type {
        "A" => Some(RecordType::A),
        "AAAA" => Some(RecordType::Aaaa),
        "TXT" => Some(RecordType::Txt),
        _ => None,
    }
}

/// Wrap a TXT value in double quotes, escaping quotes and backslashes
fn quote_txt(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Undo [`quote_txt`]; unquoted input is returned as is
fn unquote_txt(content: &str) -> String {
    let Some(inner) = content
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    else {
        return content.to_string();
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Zone document returned by GET
#[derive(Debug, Deserialize)]
struct ZoneDocument {
    name: String,
    #[serde(default)]
    rrsets: Vec<RrsetDocument>,
}

#[derive(Debug, Deserialize)]
struct RrsetDocument {
    name: String,
    #[serde(rename = "type")]
    record_type: String,
    #[serde(default)]
    ttl: u32,
    #[serde(default)]
    records: Vec<RecordDocument>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RecordDocument {
    content: String,
    #[serde(default)]
    disabled: bool,
}

impl ZoneDocument {
    /// Keep the record types the engine manages; SOA, NS and friends are dropped
    fn into_zone(self) -> Zone {
        let rrsets = self
            .rrsets
            .into_iter()
            .filter_map(|rr| {
                let record_type = parse_type(&rr.record_type)?;
                let values = rr
                    .records
                    .into_iter()
                    .filter(|r| !r.disabled)
                    .map(|r| match record_type {
                        RecordType::Txt => unquote_txt(&r.content),
                        _ => r.content,
                    })
                    .collect();
                Some(RecordSet {
                    name: relative(&rr.name),
                    record_type,
                    ttl: rr.ttl,
                    values,
                })
            })
            .collect();

        Zone {
            name: relative(&self.name),
            rrsets,
        }
    }
}

#[derive(Debug, Serialize)]
struct PatchBody {
    rrsets: Vec<RrsetChange>,
}

#[derive(Debug, Serialize)]
struct RrsetChange {
    name: String,
    #[serde(rename = "type")]
    record_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    ttl: Option<u32>,
    changetype: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    records: Vec<RecordDocument>,
}

impl RrsetChange {
    fn replace(name: &str, record_type: RecordType, ttl: u32, values: &[String]) -> Self {
        let records = values
            .iter()
            .map(|v| RecordDocument {
                content: match record_type {
                    RecordType::Txt => quote_txt(v),
                    _ => v.clone(),
                },
                disabled: false,
            })
            .collect();

        Self {
            name: absolute(name),
            record_type: record_type.as_str(),
            ttl: Some(ttl),
            changetype: "REPLACE",
            records,
        }
    }

    fn delete(name: &str, record_type: RecordType) -> Self {
        Self {
            name: absolute(name),
            record_type: record_type.as_str(),
            ttl: None,
            changetype: "DELETE",
            records: Vec::new(),
        }
    }
}

/// Factory for creating PowerDNS providers
pub struct PowerDnsFactory;

impl ZoneProviderFactory for PowerDnsFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Box<dyn ZoneProvider>> {
        match config {
            ProviderConfig::PowerDns {
                api_url,
                api_key,
                server_id,
            } => {
                if api_key.is_empty() {
                    return Err(Error::config("PowerDNS API key is required"));
                }

                let dry_run = std::env::var(MODE_ENV)
                    .unwrap_or_default()
                    .eq_ignore_ascii_case("dry-run");

                if dry_run {
                    tracing::warn!(
                        "PowerDNS provider running in DRY-RUN mode - no changes will be made"
                    );
                }

                Ok(Box::new(PowerDnsProvider::new(
                    api_url.clone(),
                    api_key.clone(),
                    server_id.clone(),
                    dry_run,
                )?))
            }
            _ => Err(Error::config("Invalid config for PowerDNS provider")),
        }
    }
}

/// Register the PowerDNS provider with a registry
///
/// # Example
///
/// ```rust
/// use dnsreg_core::BackendRegistry;
///
/// let registry = BackendRegistry::new();
/// dnsreg_provider_powerdns::register(&registry);
/// assert!(registry.has_provider("powerdns"));
/// ```
pub fn register(registry: &BackendRegistry) {
    registry.register_provider(PROVIDER_NAME, Box::new(PowerDnsFactory));
}
