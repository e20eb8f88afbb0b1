// # dnsregd - Registration Daemon
//
// Thin integration layer around `dnsreg-core`:
// 1. Reading configuration from environment variables
// 2. Registering zone providers and host stores
// 3. Building the registration engine and the expiry sweeper
// 4. Waiting for shutdown, or running a one-shot admin command
//
// DO NOT add registration, DNS or expiry logic here. It belongs in dnsreg-core.
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Zone
// - `DNSREG_ZONE`: Base zone under which hostnames are registered (required)
// - `DNSREG_BLACKLIST`: Comma-separated hostnames that can never be registered
// - `DNSREG_EXPIRATION_DAYS`: Days without update before a host expires (default 30)
// - `DNSREG_RECORD_TTL`: TTL of written records in seconds (default 60)
// - `DNSREG_REMOTE_TIMEOUT_SECS`: Deadline for each zone provider call (default 10)
// - `DNSREG_SWEEP_INTERVAL_SECS`: Expiry sweep interval, 0 disables (default 7200)
//
// ### Zone Provider
// - `DNSREG_PROVIDER_TYPE`: Provider type (powerdns, memory)
// - `DNSREG_PDNS_API_URL`: PowerDNS API base URL
// - `DNSREG_PDNS_API_KEY`: PowerDNS API key
// - `DNSREG_PDNS_SERVER_ID`: PowerDNS server id (default localhost)
//
// ### Host Store
// - `DNSREG_STORE_TYPE`: Type of host store (file, memory)
// - `DNSREG_STORE_PATH`: Path to the host file (for file store)
//
// ## Example
//
// ```bash
// export DNSREG_ZONE=dyn.example.net
// export DNSREG_BLACKLIST=www,mail,admin
// export DNSREG_PROVIDER_TYPE=powerdns
// export DNSREG_PDNS_API_URL=http://127.0.0.1:8081
// export DNSREG_PDNS_API_KEY=your_key
// export DNSREG_STORE_TYPE=file
// export DNSREG_STORE_PATH=/var/lib/dnsreg/hosts.json
//
// dnsregd serve
// dnsregd zone list
// ```

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use dnsreg_core::{
    BackendRegistry, EngineConfig, EngineEvent, HostStoreConfig, ProviderConfig,
    RegistrationEngine, RegistryConfig, SweeperConfig,
};
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum DnsregExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DnsregExitCode> for ExitCode {
    fn from(code: DnsregExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Dynamic DNS registration daemon
#[derive(Debug, Parser)]
#[command(name = "dnsregd", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the engine and the expiry sweeper until SIGTERM/SIGINT (default)
    Serve,

    /// Inspect or modify registered hosts
    Zone {
        #[command(subcommand)]
        action: ZoneAction,
    },
}

#[derive(Debug, Subcommand)]
enum ZoneAction {
    /// List every registered host
    List,

    /// Delete a host and all of its records
    Delete {
        /// Token of the host to delete
        token: String,
    },
}

/// Application configuration
struct Config {
    zone: String,
    blacklist: Vec<String>,
    expiration_days: u32,
    record_ttl: u32,
    remote_timeout_secs: u64,
    sweep_interval_secs: u64,
    provider_type: String,
    pdns_api_url: Option<String>,
    pdns_api_key: Option<String>,
    pdns_server_id: String,
    store_type: String,
    store_path: Option<String>,
    log_level: String,
}

/// Parse a numeric variable, naming it in the error
fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} must be a number. Got '{}': {}", name, raw, e)),
        _ => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Ok(Self {
            zone: env::var("DNSREG_ZONE").unwrap_or_default(),
            blacklist: env::var("DNSREG_BLACKLIST")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            expiration_days: parse_var("DNSREG_EXPIRATION_DAYS", 30)?,
            record_ttl: parse_var("DNSREG_RECORD_TTL", 60)?,
            remote_timeout_secs: parse_var("DNSREG_REMOTE_TIMEOUT_SECS", 10)?,
            sweep_interval_secs: parse_var("DNSREG_SWEEP_INTERVAL_SECS", 7200)?,
            provider_type: env::var("DNSREG_PROVIDER_TYPE")
                .unwrap_or_else(|_| "powerdns".to_string()),
            pdns_api_url: env::var("DNSREG_PDNS_API_URL").ok(),
            pdns_api_key: env::var("DNSREG_PDNS_API_KEY").ok(),
            pdns_server_id: env::var("DNSREG_PDNS_SERVER_ID")
                .unwrap_or_else(|_| "localhost".to_string()),
            store_type: env::var("DNSREG_STORE_TYPE").unwrap_or_else(|_| "file".to_string()),
            store_path: env::var("DNSREG_STORE_PATH").ok(),
            log_level: env::var("DNSREG_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration
    ///
    /// Messages name the variable at fault and how to fix it.
    fn validate(&self) -> Result<()> {
        if self.zone.is_empty() {
            anyhow::bail!(
                "DNSREG_ZONE is required. \
                Set it via: export DNSREG_ZONE=dyn.example.net"
            );
        }

        match self.provider_type.as_str() {
            "powerdns" => {
                if self.pdns_api_url.as_ref().is_none_or(|u| u.is_empty()) {
                    anyhow::bail!(
                        "DNSREG_PDNS_API_URL is required when DNSREG_PROVIDER_TYPE=powerdns. \
                        Set it via: export DNSREG_PDNS_API_URL=http://127.0.0.1:8081"
                    );
                }

                let key = self.pdns_api_key.as_deref().unwrap_or_default();
                if key.is_empty() {
                    anyhow::bail!(
                        "DNSREG_PDNS_API_KEY is required when DNSREG_PROVIDER_TYPE=powerdns. \
                        Use the api-key value from the PowerDNS configuration."
                    );
                }

                // Check for obvious placeholder keys (common mistake)
                let key_lower = key.to_lowercase();
                if key_lower.contains("your_key") || key_lower.contains("replace_me") {
                    anyhow::bail!(
                        "DNSREG_PDNS_API_KEY appears to be a placeholder. \
                        Use the api-key value from the PowerDNS configuration."
                    );
                }
            }
            "memory" => {
                eprintln!(
                    "WARNING: DNSREG_PROVIDER_TYPE=memory keeps records in process memory. \
                    Nothing is published to a real DNS server."
                );
            }
            _ => anyhow::bail!(
                "DNSREG_PROVIDER_TYPE '{}' is not supported. \
                Supported providers: powerdns, memory",
                self.provider_type
            ),
        }

        match self.store_type.as_str() {
            "memory" => {}
            "file" => match self.store_path.as_deref() {
                None | Some("") => anyhow::bail!(
                    "DNSREG_STORE_PATH is required when DNSREG_STORE_TYPE=file. \
                    Set it via: export DNSREG_STORE_PATH=/var/lib/dnsreg/hosts.json"
                ),
                Some(path) => {
                    if let Some(parent) = std::path::Path::new(path).parent()
                        && !parent.as_os_str().is_empty()
                        && !parent.exists()
                    {
                        anyhow::bail!(
                            "DNSREG_STORE_PATH parent directory does not exist: {}. \
                            Create it first: sudo mkdir -p {}",
                            parent.display(),
                            parent.display()
                        );
                    }
                }
            },
            _ => anyhow::bail!(
                "DNSREG_STORE_TYPE '{}' is not supported. \
                Supported types: file, memory",
                self.store_type
            ),
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "DNSREG_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        // Range checks are shared with the library
        self.registry_config()
            .validate()
            .map_err(|e| anyhow::anyhow!("{}", e))?;

        Ok(())
    }

    fn registry_config(&self) -> RegistryConfig {
        let provider = match self.provider_type.as_str() {
            "memory" => ProviderConfig::Memory,
            _ => ProviderConfig::PowerDns {
                api_url: self.pdns_api_url.clone().unwrap_or_default(),
                api_key: self.pdns_api_key.clone().unwrap_or_default(),
                server_id: self.pdns_server_id.clone(),
            },
        };

        let host_store = match self.store_type.as_str() {
            "memory" => HostStoreConfig::Memory,
            _ => HostStoreConfig::File {
                path: self.store_path.clone().unwrap_or_default(),
            },
        };

        let mut engine = EngineConfig::new(self.zone.clone())
            .with_blacklist(self.blacklist.iter().cloned())
            .with_expiration_days(self.expiration_days)
            .with_remote_timeout_secs(self.remote_timeout_secs);
        engine.record_ttl = self.record_ttl;

        RegistryConfig {
            provider,
            host_store,
            engine,
            sweeper: SweeperConfig {
                interval_secs: self.sweep_interval_secs.max(1),
                enabled: self.sweep_interval_secs > 0,
            },
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return DnsregExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return DnsregExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so `zone list` output stays clean
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DnsregExitCode::ConfigError.into();
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DnsregExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async move {
        let registry_config = config.registry_config();
        let (engine, events) = match build_engine(&registry_config).await {
            Ok(parts) => parts,
            Err(e) => {
                error!("Startup failed: {:#}", e);
                return DnsregExitCode::ConfigError;
            }
        };

        let outcome = match cli.command.unwrap_or(Command::Serve) {
            Command::Serve => serve(engine, events, registry_config.sweeper).await,
            Command::Zone {
                action: ZoneAction::List,
            } => list_hosts(&engine).await,
            Command::Zone {
                action: ZoneAction::Delete { token },
            } => delete_host(&engine, &token).await,
        };

        match outcome {
            Ok(()) => DnsregExitCode::CleanShutdown,
            Err(e) => {
                error!("Daemon error: {:#}", e);
                DnsregExitCode::RuntimeError
            }
        }
    });

    result.into()
}

/// Wire store, provider and engine from configuration
async fn build_engine(
    config: &RegistryConfig,
) -> Result<(Arc<RegistrationEngine>, mpsc::Receiver<EngineEvent>)> {
    let registry = BackendRegistry::with_builtins(config.engine.zone.clone());

    #[cfg(feature = "powerdns")]
    {
        debug!("Registering PowerDNS provider");
        dnsreg_provider_powerdns::register(&registry);
    }

    info!(
        "Zone provider: {}, host store: {}",
        config.provider.type_name(),
        config.host_store.type_name()
    );

    let store = registry
        .create_host_store(&config.host_store)
        .await
        .context("Failed to open host store")?;
    let provider = registry
        .create_provider(&config.provider)
        .context("Failed to create zone provider")?;

    let (engine, events) = RegistrationEngine::new(provider, store, config.engine.clone())
        .context("Failed to create registration engine")?;

    Ok((Arc::new(engine), events))
}

/// Run the engine until a shutdown signal arrives
async fn serve(
    engine: Arc<RegistrationEngine>,
    mut events: mpsc::Receiver<EngineEvent>,
    sweeper_config: SweeperConfig,
) -> Result<()> {
    info!("Starting dnsregd for zone {}", engine.zone());

    let event_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            debug!("Engine event: {:?}", event);
        }
    });

    let sweeper = if sweeper_config.enabled {
        Some(dnsreg_core::ExpirySweeper::spawn(
            Arc::clone(&engine),
            sweeper_config,
        ))
    } else {
        warn!("Expiry sweeper disabled; expired hosts will not be removed");
        None
    };

    info!("Daemon initialized successfully");

    let signal = wait_for_shutdown().await?;
    info!("Received shutdown signal: {}", signal);

    if let Some(sweeper) = sweeper {
        if tokio::time::timeout(Duration::from_secs(30), sweeper.shutdown())
            .await
            .is_err()
        {
            warn!("Expiry sweeper did not stop within 30s");
        }
    }

    engine.flush().await.context("Failed to flush host store")?;

    // Dropping the last engine handle closes the event channel
    drop(engine);
    if let Err(e) = event_task.await {
        warn!("Event task ended abnormally: {}", e);
    }

    info!("Shutdown complete");
    Ok(())
}

/// Print every registered host
async fn list_hosts(engine: &RegistrationEngine) -> Result<()> {
    let hosts = engine.hosts().await.context("Failed to list hosts")?;
    let now = Utc::now();

    println!("{:<6} {:<40} {:<40} {:<34} {:<12} SUBZONES", "ID", "FQDN", "IP", "TOKEN", "EXPIRES IN");
    for host in &hosts {
        let remaining = host.expires_at(engine.expiration_days()) - now;
        let expires_in = if remaining.num_seconds() <= 0 {
            "expired".to_string()
        } else {
            format!("{}d {}h", remaining.num_days(), remaining.num_hours() % 24)
        };

        println!(
            "{:<6} {:<40} {:<40} {:<34} {:<12} {}",
            host.id.0,
            engine.fqdn(host),
            host.ip,
            host.token.as_str(),
            expires_in,
            host.subzones.to_csv()
        );
    }
    eprintln!("{} host(s)", hosts.len());

    Ok(())
}

/// Delete one host by token
async fn delete_host(engine: &RegistrationEngine, token: &str) -> Result<()> {
    engine
        .delete(token)
        .await
        .with_context(|| format!("Failed to delete host {}", redact(token)))?;
    engine.flush().await.context("Failed to flush host store")?;

    println!("Deleted host {}", redact(token));
    Ok(())
}

fn redact(token: &str) -> String {
    format!("{}…", token.chars().take(4).collect::<String>())
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            zone: "dyn.example.net".to_string(),
            blacklist: vec!["www".to_string()],
            expiration_days: 30,
            record_ttl: 60,
            remote_timeout_secs: 10,
            sweep_interval_secs: 7200,
            provider_type: "memory".to_string(),
            pdns_api_url: None,
            pdns_api_key: None,
            pdns_server_id: "localhost".to_string(),
            store_type: "memory".to_string(),
            store_path: None,
            log_level: "info".to_string(),
        }
    }

    #[test]
    fn memory_config_is_valid() {
        config().validate().unwrap();
    }

    #[test]
    fn missing_zone_is_rejected() {
        let mut cfg = config();
        cfg.zone.clear();
        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("DNSREG_ZONE"));
    }

    #[test]
    fn powerdns_requires_url_and_key() {
        let mut cfg = config();
        cfg.provider_type = "powerdns".to_string();
        assert!(cfg.validate().unwrap_err().to_string().contains("DNSREG_PDNS_API_URL"));

        cfg.pdns_api_url = Some("http://127.0.0.1:8081".to_string());
        assert!(cfg.validate().unwrap_err().to_string().contains("DNSREG_PDNS_API_KEY"));

        cfg.pdns_api_key = Some("s3cr3t".to_string());
        cfg.validate().unwrap();
    }

    #[test]
    fn file_store_requires_path() {
        let mut cfg = config();
        cfg.store_type = "file".to_string();
        assert!(cfg.validate().unwrap_err().to_string().contains("DNSREG_STORE_PATH"));
    }

    #[test]
    fn zero_sweep_interval_disables_sweeper() {
        let mut cfg = config();
        cfg.sweep_interval_secs = 0;
        let registry_config = cfg.registry_config();
        assert!(!registry_config.sweeper.enabled);
        registry_config.validate().unwrap();
    }

    #[test]
    fn subcommands_parse() {
        let cli = Cli::try_parse_from(["dnsregd"]).unwrap();
        assert!(cli.command.is_none());

        let cli = Cli::try_parse_from(["dnsregd", "zone", "delete", "abcd"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::Zone {
                action: ZoneAction::Delete { token }
            }) if token == "abcd"
        ));
    }

    #[tokio::test]
    async fn memory_backends_build_an_engine() {
        let (engine, _events) = build_engine(&config().registry_config()).await.unwrap();
        assert_eq!(engine.zone(), "dyn.example.net");
        assert!(engine.hosts().await.unwrap().is_empty());
    }
}
