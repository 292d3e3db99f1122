//! Proxy configuration from environment variables
//!
//! | variable | default |
//! |---|---|
//! | `PROXY_ADDR` | `0.0.0.0:8788` |
//! | `PROXY_UPSTREAMS` | five futures REST hosts |
//! | `PROXY_UPSTREAM_TIMEOUT_SECS` | `10` |
//! | `PROXY_CACHE_TTL_SECS` | `3` |

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::ProxyError;

/// Upstream hosts tried in order
pub const DEFAULT_UPSTREAMS: [&str; 5] = [
    "https://fapi1.binance.com",
    "https://fapi2.binance.com",
    "https://fapi3.binance.com",
    "https://fapi4.binance.com",
    "https://testnet.binancefuture.com",
];

const DEFAULT_ADDR: &str = "0.0.0.0:8788";

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub addr: SocketAddr,
    pub upstreams: Vec<String>,
    /// Per-upstream request timeout
    pub upstream_timeout: Duration,
    /// Sent upstream as `cache-control: max-age=<secs>`
    pub cache_ttl: Duration,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8788)),
            upstreams: DEFAULT_UPSTREAMS.iter().map(|u| u.to_string()).collect(),
            upstream_timeout: Duration::from_secs(10),
            cache_ttl: Duration::from_secs(3),
        }
    }
}

impl ProxyConfig {
    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_upstreams(mut self, upstreams: Vec<String>) -> Self {
        self.upstreams = upstreams;
        self
    }

    pub fn with_upstream_timeout(mut self, timeout: Duration) -> Self {
        self.upstream_timeout = timeout;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn from_env() -> Result<Self, ProxyError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ProxyError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = lookup("PROXY_ADDR") {
            let addr = addr
                .trim()
                .parse()
                .map_err(|_| ProxyError::Config(format!("PROXY_ADDR={addr} (expected {DEFAULT_ADDR} style)")))?;
            config = config.with_addr(addr);
        }
        if let Some(raw) = lookup("PROXY_UPSTREAMS") {
            config = config.with_upstreams(parse_upstreams(&raw)?);
        }
        if let Some(secs) = lookup("PROXY_UPSTREAM_TIMEOUT_SECS") {
            config = config.with_upstream_timeout(Duration::from_secs(parse_secs("PROXY_UPSTREAM_TIMEOUT_SECS", &secs)?));
        }
        if let Some(secs) = lookup("PROXY_CACHE_TTL_SECS") {
            config = config.with_cache_ttl(Duration::from_secs(parse_secs("PROXY_CACHE_TTL_SECS", &secs)?));
        }

        Ok(config)
    }
}

fn parse_secs(key: &str, raw: &str) -> Result<u64, ProxyError> {
    raw.trim()
        .parse()
        .map_err(|_| ProxyError::Config(format!("{key}={raw} is not a whole number of seconds")))
}

fn parse_upstreams(raw: &str) -> Result<Vec<String>, ProxyError> {
    let upstreams: Vec<String> = raw
        .split(',')
        .map(|s| s.trim().trim_end_matches('/').to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if upstreams.is_empty() {
        return Err(ProxyError::Config("PROXY_UPSTREAMS is empty".to_string()));
    }
    if let Some(bad) = upstreams
        .iter()
        .find(|u| !(u.starts_with("http://") || u.starts_with("https://")))
    {
        return Err(ProxyError::Config(format!("upstream {bad} must be http(s)")));
    }

    Ok(upstreams)
}
