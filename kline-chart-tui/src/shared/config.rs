//! Viewer configuration from environment variables
//!
//! | variable | default |
//! |---|---|
//! | `KLINE_SYMBOL` | `ETHUSDT` |
//! | `KLINE_INTERVAL` | `1m` |
//! | `KLINE_LIMIT` | `500` |
//! | `KLINE_REST_MIRRORS` | five futures REST hosts |
//! | `KLINE_REST_TIMEOUT_MS` | `7000` |
//! | `KLINE_WS_HOSTS` | two futures stream hosts |
//! | `KLINE_RECONNECT_MS` | `3000` |
//! | `BB_PERIOD` / `BB_MULT` | `20` / `2.0` |
//! | `KLINE_LOG_FILE` | `kline-chart.log` |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::shared::error::ConfigError;
use crate::shared::history::{DEFAULT_LIMIT, DEFAULT_LOAD_TIMEOUT, DEFAULT_REST_MIRRORS};
use crate::shared::indicators::BandSettings;
use crate::shared::types::Interval;
use crate::shared::websocket::WebSocketConfig;

const DEFAULT_SYMBOL: &str = "ETHUSDT";
const DEFAULT_LOG_FILE: &str = "kline-chart.log";

/// Everything the viewer needs to start a view
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub symbol: String,
    pub interval: Interval,
    pub limit: u32,
    pub rest_mirrors: Vec<String>,
    pub rest_timeout: Duration,
    pub websocket: WebSocketConfig,
    pub bands: BandSettings,
    pub log_file: PathBuf,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            symbol: DEFAULT_SYMBOL.to_string(),
            interval: Interval::M1,
            limit: DEFAULT_LIMIT,
            rest_mirrors: DEFAULT_REST_MIRRORS.iter().map(|m| m.to_string()).collect(),
            rest_timeout: DEFAULT_LOAD_TIMEOUT,
            websocket: WebSocketConfig::default(),
            bands: BandSettings::default(),
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
        }
    }
}

impl ViewerConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(symbol) = lookup("KLINE_SYMBOL") {
            let symbol = symbol.trim().to_uppercase();
            if symbol.is_empty() || !symbol.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(ConfigError::Value { key: "KLINE_SYMBOL", value: symbol });
            }
            config.symbol = symbol;
        }
        if let Some(interval) = lookup("KLINE_INTERVAL") {
            config.interval = interval.parse()?;
        }
        if let Some(limit) = lookup("KLINE_LIMIT") {
            config.limit = parse_value("KLINE_LIMIT", &limit)?;
        }
        if let Some(mirrors) = lookup("KLINE_REST_MIRRORS") {
            config.rest_mirrors = parse_hosts("KLINE_REST_MIRRORS", &mirrors, &["http", "https"])?;
        }
        if let Some(ms) = lookup("KLINE_REST_TIMEOUT_MS") {
            config.rest_timeout = Duration::from_millis(parse_value("KLINE_REST_TIMEOUT_MS", &ms)?);
        }
        if let Some(hosts) = lookup("KLINE_WS_HOSTS") {
            config.websocket.hosts = parse_hosts("KLINE_WS_HOSTS", &hosts, &["ws", "wss"])?;
        }
        if let Some(ms) = lookup("KLINE_RECONNECT_MS") {
            config.websocket.reconnect_delay =
                Duration::from_millis(parse_value("KLINE_RECONNECT_MS", &ms)?);
        }
        if let Some(period) = lookup("BB_PERIOD") {
            let period: usize = parse_value("BB_PERIOD", &period)?;
            if period < 2 {
                return Err(ConfigError::Value { key: "BB_PERIOD", value: period.to_string() });
            }
            config.bands.period = period;
        }
        if let Some(mult) = lookup("BB_MULT") {
            let mult: f64 = parse_value("BB_MULT", &mult)?;
            if !mult.is_finite() || mult <= 0.0 {
                return Err(ConfigError::Value { key: "BB_MULT", value: mult.to_string() });
            }
            config.bands.multiplier = mult;
        }
        if let Some(path) = lookup("KLINE_LOG_FILE") {
            config.log_file = PathBuf::from(path);
        }

        Ok(config)
    }
}

fn parse_value<T: FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Value {
        key,
        value: raw.to_string(),
    })
}

/// Comma separated base URLs with one of `schemes`
fn parse_hosts(key: &'static str, raw: &str, schemes: &[&str]) -> Result<Vec<String>, ConfigError> {
    let hosts: Vec<String> = raw
        .split(',')
        .map(|s| s.trim().trim_end_matches('/').to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if hosts.is_empty() {
        return Err(ConfigError::EmptyList(key));
    }

    for host in &hosts {
        let url = Url::parse(host).map_err(|e| ConfigError::Url {
            url: host.clone(),
            reason: e.to_string(),
        })?;
        if !schemes.contains(&url.scheme()) {
            return Err(ConfigError::Url {
                url: host.clone(),
                reason: format!("scheme must be one of {:?}", schemes),
            });
        }
    }

    Ok(hosts)
}
