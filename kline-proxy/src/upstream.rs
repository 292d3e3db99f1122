//! Upstream transport and the ordered failover walk

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use tracing::{debug, info, warn};

use crate::error::ProxyError;

/// Kline path appended to every upstream host
pub const KLINES_PATH: &str = "/fapi/v1/klines";

/// One GET against one upstream URL; any non-2xx is an error
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    async fn get(&self, url: &str) -> Result<Bytes, ProxyError>;
}

/// reqwest-backed upstream client
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
    timeout: Duration,
    cache_control: String,
}

impl HttpUpstream {
    pub fn new(client: reqwest::Client, timeout: Duration, cache_ttl: Duration) -> Self {
        Self {
            client,
            timeout,
            cache_control: format!("max-age={}", cache_ttl.as_secs()),
        }
    }
}

#[async_trait]
impl UpstreamClient for HttpUpstream {
    async fn get(&self, url: &str) -> Result<Bytes, ProxyError> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .header(CACHE_CONTROL, self.cache_control.as_str())
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProxyError::Status(status.as_u16()));
        }

        Ok(response.bytes().await?)
    }
}

/// Upstream URL for `host`, carrying the inbound query string unchanged
pub fn upstream_url(host: &str, query: Option<&str>) -> String {
    match query {
        Some(q) if !q.is_empty() => format!("{host}{KLINES_PATH}?{q}"),
        _ => format!("{host}{KLINES_PATH}"),
    }
}

/// Try each host in order and return the first 2xx body.
///
/// Returns the last error when every host fails.
pub async fn forward(
    client: &dyn UpstreamClient,
    hosts: &[String],
    query: Option<&str>,
) -> Result<Bytes, ProxyError> {
    let mut last_error = ProxyError::Config("no upstreams configured".to_string());

    for host in hosts {
        let url = upstream_url(host, query);
        debug!("Forwarding to {}", url);

        match client.get(&url).await {
            Ok(body) => {
                info!("Served {} bytes from {}", body.len(), host);
                return Ok(body);
            }
            Err(e) => {
                warn!("Upstream {} failed: {}", host, e);
                last_error = e;
            }
        }
    }

    warn!("All {} upstreams failed", hosts.len());
    Err(last_error)
}
