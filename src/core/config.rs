/// Configuration Loading
///
/// All configuration comes from environment variables and is read once at
/// start-up into a `Config`. Unparsable numeric values fall back to their
/// defaults with a warning; an unknown transport mode or a non-HTTP table URL
/// is rejected.
///
/// Environment Variables:
/// - SERVER_NAME: Name reported by `initialize` (default: "Navi MCP Server")
/// - SERVER_VERSION: Version reported by `initialize` (default: "1.0.0")
/// - MCP_TRANSPORT_MODE: "stdio", "http", or "both" (default: "http")
/// - HOST / PORT: HTTP bind address (default: "0.0.0.0" / 3000)
/// - WORKER_THREADS: actix worker count (default: CPU count, max 16)
/// - STOCK_URL, RESERVATION_URL, PRICE_CATALOG_URL: remote table endpoints
/// - UPSTREAM_TIMEOUT_SECS: per-fetch timeout (default: 20)
/// - SSE_KEEPALIVE_SECS: keep-alive comment interval (default: 30)
/// - REST_FACADE: expose `/tools/*` webhook routes (default: true)

use std::str::FromStr;
use std::time::Duration;

use crate::core::error::ConfigError;

pub const DEFAULT_STOCK_URL: &str = "https://script.google.com/macros/s/AKfycbxwJ7ht-S4EzizZxkXUjkrl5PnL3nxuC4nLN-hmDMDUWSHpgdX11ucSRDy-9AiY6eI1jA/exec";
pub const DEFAULT_RESERVATION_URL: &str = "https://script.google.com/macros/s/AKfycbxPa5Bu_B-q-A925YhFF-JFW9iRDEuGI7hfKq5jSMlUHmBM46ZmsCmekG7uRQ19Zoa9/exec";
pub const DEFAULT_PRICE_CATALOG_URL: &str = "https://script.google.com/macros/s/AKfycbzStu9JYQmMWJTdASLaMnBq7BkNtMfIytK5KW4e5IzUD__MBEWsq_Vq-Vlyhdw8t4Mh/exec";

/// Which transport adapters run in this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    Stdio,
    Http,
    Both,
}

impl FromStr for TransportMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdio" => Ok(TransportMode::Stdio),
            "http" => Ok(TransportMode::Http),
            "both" => Ok(TransportMode::Both),
            _ => Err(ConfigError::TransportMode(s.to_string())),
        }
    }
}

/// URLs of the three remote tables.
#[derive(Debug, Clone)]
pub struct TableUrls {
    pub stock: String,
    pub reservation: String,
    pub price_catalog: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_name: String,
    pub server_version: String,
    pub transport: TransportMode,
    pub host: String,
    pub port: u16,
    pub workers: usize,
    pub tables: TableUrls,
    pub upstream_timeout: Duration,
    pub keepalive_interval: Duration,
    pub rest_facade: bool,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let transport = var("MCP_TRANSPORT_MODE", "http").parse()?;

        let default_workers = num_cpus::get().clamp(1, 16);

        let tables = TableUrls {
            stock: checked_url("STOCK_URL", var("STOCK_URL", DEFAULT_STOCK_URL))?,
            reservation: checked_url(
                "RESERVATION_URL",
                var("RESERVATION_URL", DEFAULT_RESERVATION_URL),
            )?,
            price_catalog: checked_url(
                "PRICE_CATALOG_URL",
                var("PRICE_CATALOG_URL", DEFAULT_PRICE_CATALOG_URL),
            )?,
        };

        Ok(Config {
            server_name: var("SERVER_NAME", "Navi MCP Server"),
            server_version: var("SERVER_VERSION", "1.0.0"),
            transport,
            host: var("HOST", "0.0.0.0"),
            port: parse_or(&lookup, "PORT", 3000),
            workers: parse_or(&lookup, "WORKER_THREADS", default_workers).max(1),
            tables,
            upstream_timeout: Duration::from_secs(
                parse_or(&lookup, "UPSTREAM_TIMEOUT_SECS", 20u64).max(1),
            ),
            keepalive_interval: Duration::from_secs(
                parse_or(&lookup, "SSE_KEEPALIVE_SECS", 30u64).max(1),
            ),
            rest_facade: parse_flag(&lookup, "REST_FACADE", true),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Copy + std::fmt::Display,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, %default, "unparsable value, using default");
            default
        }),
    }
}

fn parse_flag<F>(lookup: &F, key: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).map(|v| v.trim().to_ascii_lowercase()) {
        None => default,
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => {
                tracing::warn!(key, value = %v, default, "unparsable flag, using default");
                default
            }
        },
    }
}

fn checked_url(var: &'static str, value: String) -> Result<String, ConfigError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(value)
    } else {
        Err(ConfigError::Url { var, value })
    }
}
