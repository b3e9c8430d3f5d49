//! Application configuration loaded from environment variables.

use std::time::Duration;

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `8080`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `GRACEFUL_SHUTDOWN_TIMEOUT_SEC`: drain budget after shutdown starts (default: `2`)
/// - `REQUEST_TIMEOUT_SEC`: per-request deadline (default: `5`)
/// - `EVENT_CHANNEL_CAPACITY`: hand-off queue size (default: `100`)
/// - `WORKER_PROCESSING_DELAY_MS`: simulated processing time (default: `2000`)
/// - `DATABASE_URL`: PostgreSQL connection string; the in-memory store is used when unset
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: `10`)
/// - `TRACING_EXPORTER_ENDPOINT`: collector address for spans (default: unset)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub graceful_shutdown_timeout: Duration,
    pub request_timeout: Duration,
    pub event_channel_capacity: usize,
    pub worker_processing_delay: Duration,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    /// Recorded and logged only; spans stay in-process either way.
    pub tracing_exporter_endpoint: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    ///
    /// Unparseable numeric values fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let number = |name: &str| lookup(name).and_then(|v| v.trim().parse::<u64>().ok());

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: lookup("LOG_FORMAT")
                .map(|f| LogFormat::parse(&f))
                .unwrap_or(defaults.log_format),
            graceful_shutdown_timeout: number("GRACEFUL_SHUTDOWN_TIMEOUT_SEC")
                .map(Duration::from_secs)
                .unwrap_or(defaults.graceful_shutdown_timeout),
            request_timeout: number("REQUEST_TIMEOUT_SEC")
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            event_channel_capacity: number("EVENT_CHANNEL_CAPACITY")
                .filter(|&c| c > 0)
                .map(|c| c as usize)
                .unwrap_or(defaults.event_channel_capacity),
            worker_processing_delay: number("WORKER_PROCESSING_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.worker_processing_delay),
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            database_max_connections: lookup("DATABASE_MAX_CONNECTIONS")
                .and_then(|c| c.trim().parse().ok())
                .unwrap_or(defaults.database_max_connections),
            tracing_exporter_endpoint: lookup("TRACING_EXPORTER_ENDPOINT")
                .filter(|endpoint| !endpoint.trim().is_empty()),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            graceful_shutdown_timeout: Duration::from_secs(2),
            request_timeout: Duration::from_secs(5),
            event_channel_capacity: pipeline::DEFAULT_CHANNEL_CAPACITY,
            worker_processing_delay: pipeline::SimulatedFulfillment::DEFAULT_DELAY,
            database_url: None,
            database_max_connections: 10,
            tracing_exporter_endpoint: None,
        }
    }
}
