use crate::domain::relay::{Relay, RelayTls};
use anyhow::Context;
use clap::{Args, Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    #[command(flatten)]
    pub server: ServerConfig,

    #[command(flatten)]
    pub database: DatabaseConfig,

    #[command(flatten)]
    pub relays: RelayConfig,

    #[command(flatten)]
    pub dispatch: DispatchConfig,

    #[command(flatten)]
    pub retention: RetentionConfig,

    #[command(flatten)]
    pub health: HealthConfig,

    #[command(flatten)]
    pub telemetry: TelemetryConfig,
}

#[derive(Clone, Debug, Args)]
pub struct ServerConfig {
    /// Host to listen on
    #[arg(long, env = "COURIER_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port for the public API
    #[arg(long, env = "COURIER_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Port for the management API (health probes)
    #[arg(long, env = "COURIER_MGMT_PORT", default_value_t = 9090)]
    pub mgmt_port: u16,

    /// Largest accepted request body. Covers a fully escaped 1 MiB JSON body plus base64 attachments.
    #[arg(long, env = "COURIER_MAX_REQUEST_BYTES", default_value_t = 64 * 1024 * 1024)]
    pub max_request_bytes: usize,

    /// Time allowed for inbound requests before they are aborted
    #[arg(long, env = "COURIER_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Time to wait for background workers after the servers stop
    #[arg(long, env = "COURIER_SHUTDOWN_TIMEOUT_SECS", default_value_t = 10)]
    pub shutdown_timeout_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL. Records are kept in memory when unset.
    #[arg(long = "database-url", env = "COURIER_DATABASE_URL")]
    pub url: Option<String>,

    #[arg(long, env = "COURIER_DB_MAX_CONNECTIONS", default_value_t = 20)]
    pub max_connections: u32,

    #[arg(long, env = "COURIER_DB_MIN_CONNECTIONS", default_value_t = 2)]
    pub min_connections: u32,

    #[arg(long, env = "COURIER_DB_ACQUIRE_TIMEOUT_SECS", default_value_t = 5)]
    pub acquire_timeout_secs: u64,

    #[arg(long, env = "COURIER_DB_IDLE_TIMEOUT_SECS", default_value_t = 600)]
    pub idle_timeout_secs: u64,

    #[arg(long, env = "COURIER_DB_MAX_LIFETIME_SECS", default_value_t = 1800)]
    pub max_lifetime_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct RelayConfig {
    /// JSON file holding an array of relay definitions
    #[arg(long, env = "COURIER_RELAYS_FILE")]
    pub relays_file: Option<PathBuf>,

    /// Host of an inline relay, appended after the relays from the file
    #[arg(long, env = "COURIER_SMTP_HOST")]
    pub smtp_host: Option<String>,

    #[arg(long, env = "COURIER_SMTP_PORT", default_value_t = 587)]
    pub smtp_port: u16,

    #[arg(long, env = "COURIER_SMTP_USERNAME")]
    pub smtp_username: Option<String>,

    #[arg(long, env = "COURIER_SMTP_PASSWORD", hide_env_values = true)]
    pub smtp_password: Option<String>,

    /// From address used for mail sent through the inline relay
    #[arg(long, env = "COURIER_SMTP_FROM")]
    pub smtp_from: Option<String>,

    #[arg(long, env = "COURIER_SMTP_TLS", value_enum)]
    pub smtp_tls: Option<RelayTls>,

    /// Timeout for a single SMTP conversation
    #[arg(long, env = "COURIER_SMTP_TIMEOUT_SECS", default_value_t = 20)]
    pub smtp_timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            relays_file: None,
            smtp_host: None,
            smtp_port: 587,
            smtp_username: None,
            smtp_password: None,
            smtp_from: None,
            smtp_tls: None,
            smtp_timeout_secs: 20,
        }
    }
}

impl RelayConfig {
    /// Loads the relay list: entries from the relays file first, then the inline relay.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, if the inline relay has no from
    /// address, or if any relay's from address is not a valid mailbox.
    pub fn load_relays(&self) -> anyhow::Result<Vec<Relay>> {
        let mut relays: Vec<Relay> = match &self.relays_file {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read relays file {}", path.display()))?;
                serde_json::from_str(&raw).with_context(|| format!("Invalid relays file {}", path.display()))?
            }
            None => Vec::new(),
        };

        if let Some(host) = &self.smtp_host {
            let from_email = self.smtp_from.clone().context("COURIER_SMTP_FROM is required with COURIER_SMTP_HOST")?;
            relays.push(Relay {
                name: Some("inline".to_string()),
                host: host.clone(),
                port: self.smtp_port,
                username: self.smtp_username.clone(),
                password: self.smtp_password.clone(),
                from_email,
                tls: self.smtp_tls,
            });
        }

        for relay in &relays {
            relay
                .from_email
                .parse::<lettre::message::Mailbox>()
                .with_context(|| format!("Relay {} has an invalid from address", relay.label()))?;
        }

        Ok(relays)
    }
}

#[derive(Clone, Debug, Args)]
pub struct DispatchConfig {
    /// How long shutdown waits for in-flight deliveries. 0 skips the wait.
    #[arg(long, env = "COURIER_DRAIN_TIMEOUT_SECS", default_value_t = 30)]
    pub drain_timeout_secs: u64,

    /// Extra attempts for the status write that follows a delivery
    #[arg(long, env = "COURIER_RECONCILE_RETRIES", default_value_t = 2)]
    pub reconcile_retries: usize,

    #[arg(long, env = "COURIER_RECONCILE_BACKOFF_MS", default_value_t = 200)]
    pub reconcile_backoff_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self { drain_timeout_secs: 30, reconcile_retries: 2, reconcile_backoff_ms: 200 }
    }
}

#[derive(Clone, Debug, Args)]
pub struct RetentionConfig {
    /// Age after which email records are deleted
    #[arg(
        long,
        env = "COURIER_RETENTION_DAYS",
        default_value_t = 90,
        value_parser = clap::value_parser!(u32).range(1..=36_500)
    )]
    pub retention_days: u32,

    /// How often to run the retention cleanup task
    #[arg(long, env = "COURIER_CLEANUP_INTERVAL_SECS", default_value_t = 3600)]
    pub cleanup_interval_secs: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self { retention_days: 90, cleanup_interval_secs: 3600 }
    }
}

#[derive(Clone, Debug, Args)]
pub struct HealthConfig {
    /// Timeout for the record store readiness probe
    #[arg(long, env = "COURIER_HEALTH_STORE_TIMEOUT_MS", default_value_t = 2000)]
    pub store_timeout_ms: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self { store_timeout_ms: 2000 }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Debug, Default, Args)]
pub struct TelemetryConfig {
    /// OTLP collector endpoint. Traces and metrics are only exported when set.
    #[arg(long, env = "COURIER_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,

    #[arg(long, env = "COURIER_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Config {
    #[must_use]
    pub fn load() -> Self {
        Self::parse()
    }
}
