//! Command line and environment configuration

use std::net::SocketAddr;
use std::time::Duration;

use clap::{Args, Parser};
use edi_adapter_db::ConnectionConfig;

use crate::resilience::{BreakerSettings, RateLimit, RetryPolicy};

/// HTTP service for ANSI X12 ingest
#[derive(Debug, Clone, Parser)]
#[command(name = "edi-processor")]
#[command(about = "HTTP service for ANSI X12 EDI ingest")]
#[command(version)]
pub struct Config {
    /// Bind address
    #[arg(long, env = "SERVICE_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Bind port
    #[arg(long, env = "SERVICE_PORT", default_value_t = 8080)]
    pub port: u16,

    /// `development` enables detailed human-readable logging
    #[arg(long, env = "ENVIRONMENT", default_value = "production")]
    pub environment: String,

    /// Service name reported in logs and health checks
    #[arg(long, env = "APP_NAME", default_value = "edi-processor")]
    pub app_name: String,

    /// Tracing filter directive
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[command(flatten)]
    pub database: DatabaseArgs,

    #[command(flatten)]
    pub resilience: ResilienceArgs,
}

impl Config {
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    pub fn bind_address(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

#[derive(Debug, Clone, Args)]
pub struct DatabaseArgs {
    /// libsql local path, `:memory:`, or `libsql://` / `https://` URL
    #[arg(long, env = "DB_URL", default_value = "edi.db")]
    pub db_url: String,

    /// Remote database host; takes precedence over `DB_URL`
    #[arg(long, env = "DB_HOST")]
    pub db_host: Option<String>,

    #[arg(long, env = "DB_PORT")]
    pub db_port: Option<u16>,

    /// `disable` selects plain http for remote databases
    #[arg(long, env = "DB_SSL_MODE")]
    pub db_ssl_mode: Option<String>,

    /// Local database name, stored as `<name>.db`
    #[arg(long, env = "DB_NAME")]
    pub db_name: Option<String>,

    /// Auth token for remote databases
    #[arg(long, env = "DB_PASSWORD", hide_env_values = true)]
    pub db_password: Option<String>,

    #[arg(long, env = "DB_MAX_CONNECTIONS", default_value_t = 25)]
    pub db_max_connections: usize,

    #[arg(long, env = "DB_TIMEOUT_MS", default_value_t = 5_000)]
    pub db_timeout_ms: u64,

    #[arg(long, env = "DB_RETRY_ATTEMPTS", default_value_t = 3)]
    pub db_retry_attempts: usize,
}

impl DatabaseArgs {
    pub fn connection_config(&self) -> ConnectionConfig {
        let database_url = match (&self.db_host, &self.db_name) {
            (Some(host), _) => {
                let scheme = match self.db_ssl_mode.as_deref() {
                    Some(mode) if mode.eq_ignore_ascii_case("disable") => "http",
                    _ => "https",
                };
                match self.db_port {
                    Some(port) => format!("{scheme}://{host}:{port}"),
                    None => format!("{scheme}://{host}"),
                }
            }
            (None, Some(name)) => format!("{name}.db"),
            (None, None) => self.db_url.clone(),
        };

        let in_memory = database_url == ":memory:";
        ConnectionConfig {
            database_url,
            auth_token: self.db_password.clone().filter(|p| !p.is_empty()),
            // every :memory: connection is its own database
            max_connections: if in_memory { 1 } else { self.db_max_connections.max(1) },
            timeout_ms: self.db_timeout_ms,
            retry_attempts: self.db_retry_attempts,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct ResilienceArgs {
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Maximum in-flight requests
    #[arg(long, env = "BULKHEAD_CAPACITY", default_value_t = 100)]
    pub bulkhead_capacity: usize,

    #[arg(long, env = "RATE_LIMIT_RPS", default_value_t = 100.0)]
    pub rate_limit_rps: f64,

    #[arg(long, env = "RATE_LIMIT_BURST", default_value_t = 200)]
    pub rate_limit_burst: u32,

    /// Keep an independent bucket per partner
    #[arg(long, env = "RATE_LIMIT_PER_PARTNER", default_value_t = true, action = clap::ArgAction::Set)]
    pub rate_limit_per_partner: bool,

    #[arg(long, env = "RETRY_MAX_ATTEMPTS", default_value_t = 3)]
    pub retry_max_attempts: u32,

    /// Also retry write endpoints
    #[arg(long, env = "RETRY_WRITES", default_value_t = false, action = clap::ArgAction::Set)]
    pub retry_writes: bool,
}

impl Default for ResilienceArgs {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            bulkhead_capacity: 100,
            rate_limit_rps: 100.0,
            rate_limit_burst: 200,
            rate_limit_per_partner: true,
            retry_max_attempts: 3,
            retry_writes: false,
        }
    }
}

impl ResilienceArgs {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn rate_limit(&self) -> RateLimit {
        RateLimit::new(self.rate_limit_rps, self.rate_limit_burst)
    }

    pub fn breaker(&self) -> BreakerSettings {
        BreakerSettings::default()
    }

    pub fn read_retry(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_max_attempts)
    }

    pub fn write_retry(&self) -> RetryPolicy {
        if self.retry_writes {
            RetryPolicy::new(self.retry_max_attempts)
        } else {
            RetryPolicy::none()
        }
    }
}
