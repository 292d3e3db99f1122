//! Historical kline loader with REST mirror failover
//!
//! Mirrors are tried strictly in order and the first good response wins. All
//! attempts share one deadline: once it passes, the remaining mirrors are
//! skipped and the chart is filled with synthetic bars instead.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use crate::shared::error::FetchError;
use crate::shared::types::{parse_rest_klines, Candle, Interval};

/// REST path of the futures kline endpoint
pub const KLINES_PATH: &str = "/fapi/v1/klines";

/// Mirrors tried for historical klines, in order
pub const DEFAULT_REST_MIRRORS: [&str; 5] = [
    "https://fapi1.binance.com",
    "https://fapi2.binance.com",
    "https://fapi3.binance.com",
    "https://fapi4.binance.com",
    "https://testnet.binancefuture.com",
];

/// Deadline shared by the whole mirror sequence
pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_millis(7000);

/// Bars requested per load
pub const DEFAULT_LIMIT: u32 = 500;

/// Bars generated when every mirror fails
pub const MOCK_BARS: usize = 300;

const MOCK_START_PRICE: f64 = 3000.0;

/// Parameters of one historical load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRequest {
    pub symbol: String,
    pub interval: Interval,
    pub limit: u32,
}

impl HistoryRequest {
    pub fn new(symbol: impl Into<String>, interval: Interval) -> Self {
        Self {
            symbol: symbol.into(),
            interval,
            limit: DEFAULT_LIMIT,
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Kline URL on `mirror` for this request
    pub fn url_for(&self, mirror: &str) -> Result<Url, FetchError> {
        let base = format!("{}{}", mirror.trim_end_matches('/'), KLINES_PATH);
        Url::parse_with_params(
            &base,
            &[
                ("symbol", self.symbol.as_str()),
                ("interval", self.interval.as_str()),
                ("limit", &self.limit.to_string()),
            ],
        )
        .map_err(|e| FetchError::Transport(format!("invalid mirror URL {}: {}", mirror, e)))
    }
}

/// Where a loaded series came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistorySource {
    Mirror(String),
    Mock,
}

impl HistorySource {
    pub fn is_mock(&self) -> bool {
        matches!(self, HistorySource::Mock)
    }

    /// Short label for the status line
    pub fn label(&self) -> &str {
        match self {
            HistorySource::Mirror(base) if base.contains("testnet") => "Futures Testnet",
            HistorySource::Mirror(_) => "Futures Prod",
            HistorySource::Mock => "Mock",
        }
    }
}

/// Loaded historical series
#[derive(Debug, Clone)]
pub struct History {
    pub candles: Vec<Candle>,
    pub source: HistorySource,
}

/// Transport for one kline request
#[async_trait]
pub trait KlineFetcher: Send + Sync {
    async fn fetch_klines(&self, url: &Url) -> Result<Vec<Candle>, FetchError>;
}

/// reqwest-backed fetcher
#[derive(Debug, Clone, Default)]
pub struct RestKlineFetcher {
    client: reqwest::Client,
}

impl RestKlineFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl KlineFetcher for RestKlineFetcher {
    async fn fetch_klines(&self, url: &Url) -> Result<Vec<Candle>, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .header(reqwest::header::CACHE_CONTROL, "no-store")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| FetchError::Malformed(e.to_string()))?;

        parse_rest_klines(&body)
    }
}

/// Sequential mirror loader
pub struct HistoryLoader<F> {
    fetcher: F,
    mirrors: Vec<String>,
    timeout: Duration,
}

impl<F: KlineFetcher> HistoryLoader<F> {
    pub fn new(fetcher: F, mirrors: Vec<String>) -> Self {
        Self {
            fetcher,
            mirrors,
            timeout: DEFAULT_LOAD_TIMEOUT,
        }
    }

    /// Set the deadline shared by the whole mirror sequence
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Load history, falling back to mock bars.
    ///
    /// Returns `None` when `cancelled` is set, in which case the result is discarded.
    pub async fn load(&self, request: &HistoryRequest, cancelled: &AtomicBool) -> Option<History> {
        let deadline = Instant::now() + self.timeout;

        for mirror in &self.mirrors {
            if cancelled.load(Ordering::Acquire) {
                return None;
            }

            let url = match request.url_for(mirror) {
                Ok(url) => url,
                Err(e) => {
                    warn!("Skipping mirror {}: {}", mirror, e);
                    continue;
                }
            };

            debug!("Requesting klines from {}", url);
            let result = tokio::time::timeout_at(deadline, self.fetcher.fetch_klines(&url)).await;

            if cancelled.load(Ordering::Acquire) {
                return None;
            }

            match result {
                Ok(Ok(candles)) => {
                    info!(
                        "Loaded {} {} {} klines from {}",
                        candles.len(),
                        request.symbol,
                        request.interval,
                        mirror
                    );
                    return Some(History {
                        candles: normalize(candles),
                        source: HistorySource::Mirror(mirror.clone()),
                    });
                }
                Ok(Err(e)) => {
                    warn!("Mirror {} failed: {}", mirror, e);
                }
                Err(_) => {
                    warn!(
                        "Kline load deadline of {:?} passed while waiting on {}, abandoning remaining mirrors",
                        self.timeout, mirror
                    );
                    break;
                }
            }
        }

        if cancelled.load(Ordering::Acquire) {
            return None;
        }

        warn!(
            "All REST mirrors failed for {} {}, using mock data",
            request.symbol, request.interval
        );
        let now = Utc::now().timestamp();
        Some(History {
            candles: generate_mock(now, request.interval, MOCK_BARS, &mut rand::rng()),
            source: HistorySource::Mock,
        })
    }
}

/// Sort by time and keep the last candle per timestamp
fn normalize(mut candles: Vec<Candle>) -> Vec<Candle> {
    if candles.windows(2).all(|w| w[0].time < w[1].time) {
        return candles;
    }
    candles.sort_by_key(|c| c.time);
    let mut out: Vec<Candle> = Vec::with_capacity(candles.len());
    for candle in candles {
        match out.last_mut() {
            Some(last) if last.time == candle.time => *last = candle,
            _ => out.push(candle),
        }
    }
    out
}

/// Synthetic random-walk bars so the chart is never empty.
///
/// Drift is `sin(i/20)*10` plus uniform noise; the series is laid out so the
/// last bar opens one bar before `now`.
pub fn generate_mock<R: Rng + ?Sized>(now: i64, interval: Interval, bars: usize, rng: &mut R) -> Vec<Candle> {
    let step = interval.seconds();
    let from = now - step * bars as i64;
    let mut out = Vec::with_capacity(bars);
    let mut price = MOCK_START_PRICE;

    for i in 0..bars {
        let time = from + i as i64 * step;
        let drift = (i as f64 / 20.0).sin() * 10.0 + (rng.random::<f64>() - 0.5) * 5.0;
        let open = price;
        let close = (open + drift).max(1.0);
        let high = open.max(close) + rng.random::<f64>() * 5.0;
        let low = open.min(close) - rng.random::<f64>() * 5.0;
        out.push(Candle::new(time, open, high, low, close));
        price = close;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[derive(Clone)]
    enum Script {
        Fail(FetchError),
        Succeed(usize),
        Hang,
    }

    /// Scripted fetcher keyed by mirror host; records every URL requested
    #[derive(Clone, Default)]
    struct FakeFetcher {
        scripts: HashMap<String, Script>,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl FakeFetcher {
        fn with(mut self, host: &str, script: Script) -> Self {
            self.scripts.insert(host.to_string(), script);
            self
        }

        fn called_hosts(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl KlineFetcher for FakeFetcher {
        async fn fetch_klines(&self, url: &Url) -> Result<Vec<Candle>, FetchError> {
            let host = url.host_str().unwrap_or_default().to_string();
            self.calls.lock().unwrap().push(host.clone());
            match self.scripts.get(&host).cloned() {
                Some(Script::Succeed(n)) => Ok((0..n)
                    .map(|i| Candle::new(1_700_000_000 + i as i64 * 60, 1.0, 2.0, 0.5, 1.5))
                    .collect()),
                Some(Script::Fail(e)) => Err(e),
                Some(Script::Hang) => {
                    std::future::pending::<()>().await;
                    unreachable!()
                }
                None => Err(FetchError::Transport("connection refused".to_string())),
            }
        }
    }

    fn mirrors(hosts: &[&str]) -> Vec<String> {
        hosts.iter().map(|h| format!("https://{}", h)).collect()
    }

    #[test]
    fn test_request_url() {
        let request = HistoryRequest::new("ETHUSDT", Interval::M15).with_limit(200);
        let url = request.url_for("https://fapi1.binance.com/").unwrap();
        assert_eq!(
            url.as_str(),
            "https://fapi1.binance.com/fapi/v1/klines?symbol=ETHUSDT&interval=15m&limit=200"
        );
    }

    #[tokio::test]
    async fn test_first_success_wins_and_stops() {
        let fetcher = FakeFetcher::default()
            .with("a.test", Script::Fail(FetchError::Status(451)))
            .with("b.test", Script::Succeed(42))
            .with("c.test", Script::Succeed(7));
        let loader = HistoryLoader::new(fetcher.clone(), mirrors(&["a.test", "b.test", "c.test"]));

        let history = loader
            .load(&HistoryRequest::new("ETHUSDT", Interval::M1), &AtomicBool::new(false))
            .await
            .unwrap();

        assert_eq!(history.candles.len(), 42);
        assert_eq!(history.source, HistorySource::Mirror("https://b.test".to_string()));
        assert_eq!(fetcher.called_hosts(), vec!["a.test", "b.test"]);
    }

    #[tokio::test]
    async fn test_all_mirrors_failing_falls_back_to_mock() {
        let fetcher = FakeFetcher::default()
            .with("a.test", Script::Fail(FetchError::Malformed("not an array".to_string())))
            .with("b.test", Script::Fail(FetchError::Status(502)));
        let loader = HistoryLoader::new(fetcher.clone(), mirrors(&["a.test", "b.test"]));

        let before = Utc::now().timestamp();
        let history = loader
            .load(&HistoryRequest::new("ETHUSDT", Interval::M1), &AtomicBool::new(false))
            .await
            .unwrap();
        let after = Utc::now().timestamp();

        assert!(history.source.is_mock());
        assert_eq!(history.candles.len(), MOCK_BARS);
        let last = history.candles.last().unwrap().time;
        assert!(last >= before - 60 && last <= after, "last bar {} not near now", last);
        assert_eq!(fetcher.called_hosts(), vec!["a.test", "b.test"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_deadline_abandons_remaining_mirrors() {
        let fetcher = FakeFetcher::default()
            .with("a.test", Script::Hang)
            .with("b.test", Script::Succeed(10));
        let loader = HistoryLoader::new(fetcher.clone(), mirrors(&["a.test", "b.test"]))
            .with_timeout(Duration::from_secs(7));

        let history = loader
            .load(&HistoryRequest::new("ETHUSDT", Interval::H1), &AtomicBool::new(false))
            .await
            .unwrap();

        assert!(history.source.is_mock());
        assert_eq!(fetcher.called_hosts(), vec!["a.test"]);
    }

    #[tokio::test]
    async fn test_cancelled_load_discards_result() {
        let fetcher = FakeFetcher::default().with("a.test", Script::Succeed(5));
        let loader = HistoryLoader::new(fetcher.clone(), mirrors(&["a.test"]));

        let result = loader
            .load(&HistoryRequest::new("ETHUSDT", Interval::M1), &AtomicBool::new(true))
            .await;

        assert!(result.is_none());
        assert!(fetcher.called_hosts().is_empty());
    }

    #[tokio::test]
    async fn test_no_mirrors_means_mock() {
        let loader = HistoryLoader::new(FakeFetcher::default(), Vec::new());
        let history = loader
            .load(&HistoryRequest::new("ETHUSDT", Interval::M5), &AtomicBool::new(false))
            .await
            .unwrap();
        assert_eq!(history.candles.len(), MOCK_BARS);
        assert!(history.source.is_mock());
    }

    #[test]
    fn test_generate_mock_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        let now = 1_700_000_000;
        let bars = generate_mock(now, Interval::M5, 300, &mut rng);

        assert_eq!(bars.len(), 300);
        assert_eq!(bars.first().unwrap().open, MOCK_START_PRICE);
        assert_eq!(bars.last().unwrap().time, now - 300);
        for w in bars.windows(2) {
            assert_eq!(w[1].time - w[0].time, 300);
            assert_eq!(w[1].open, w[0].close);
        }
        for c in &bars {
            assert!(c.high >= c.open.max(c.close));
            assert!(c.low <= c.open.min(c.close));
            assert!(c.close >= 1.0);
        }
    }

    #[test]
    fn test_normalize_sorts_and_dedups() {
        let c = |t: i64, close: f64| Candle::new(t, close, close, close, close);
        let out = normalize(vec![c(120, 2.0), c(60, 1.0), c(120, 3.0)]);
        assert_eq!(out, vec![c(60, 1.0), c(120, 3.0)]);
    }

    #[test]
    fn test_source_label() {
        assert_eq!(HistorySource::Mirror("https://testnet.binancefuture.com".into()).label(), "Futures Testnet");
        assert_eq!(HistorySource::Mirror("https://fapi1.binance.com".into()).label(), "Futures Prod");
        assert_eq!(HistorySource::Mock.label(), "Mock");
    }

    /// Local kline endpoint: the `symbol` query picks the response
    async fn serve_klines() -> String {
        use axum::{extract::RawQuery, http::StatusCode, response::IntoResponse, routing::get, Router};

        async fn klines(RawQuery(query): RawQuery) -> axum::response::Response {
            let query = query.unwrap_or_default();
            if query.contains("symbol=ETHUSDT") {
                (
                    [("content-type", "application/json")],
                    r#"[[1700000000000,"10.5","11","10","10.75","100"],[1700000060000,10.75,12,10.5,11.5,"80"]]"#,
                )
                    .into_response()
            } else if query.contains("symbol=OBJECT") {
                ([("content-type", "application/json")], r#"{"code":-1121,"msg":"Invalid symbol."}"#).into_response()
            } else {
                (StatusCode::SERVICE_UNAVAILABLE, "maintenance").into_response()
            }
        }

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().route(KLINES_PATH, get(klines));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_rest_fetcher_against_local_server() {
        let base = serve_klines().await;
        let fetcher = RestKlineFetcher::new(reqwest::Client::new());
        let url = |symbol: &str| HistoryRequest::new(symbol, Interval::M1).url_for(&base).unwrap();

        let candles = fetcher.fetch_klines(&url("ETHUSDT")).await.unwrap();
        assert_eq!(
            candles,
            vec![
                Candle::new(1_700_000_000, 10.5, 11.0, 10.0, 10.75),
                Candle::new(1_700_000_060, 10.75, 12.0, 10.5, 11.5),
            ]
        );

        assert_eq!(fetcher.fetch_klines(&url("BTCUSDT")).await, Err(FetchError::Status(503)));
        assert!(matches!(
            fetcher.fetch_klines(&url("OBJECT")).await,
            Err(FetchError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_loader_skips_dead_mirror_over_http() {
        let base = serve_klines().await;

        // Bound then dropped: connections are refused
        let dead = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead_base = format!("http://{}", dead.local_addr().unwrap());
        drop(dead);

        let loader = HistoryLoader::new(RestKlineFetcher::new(reqwest::Client::new()), vec![dead_base, base.clone()])
            .with_timeout(Duration::from_secs(5));
        let history = loader
            .load(&HistoryRequest::new("ETHUSDT", Interval::M1), &AtomicBool::new(false))
            .await
            .unwrap();

        assert_eq!(history.source, HistorySource::Mirror(base));
        assert_eq!(history.candles.len(), 2);
    }
}
