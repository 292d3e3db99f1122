/// Live kline feed over WebSocket
///
/// Reconnects forever with a fixed delay, rotating round-robin through the feed
/// hosts. The reconnect policy lives in [`FeedSession`], a plain state machine,
/// and [`spawn_live_feed`] drives it with a real socket.

use crate::shared::error::FeedError;
use crate::shared::types::{parse_stream_candle, Candle, Interval};
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

/// Feed hosts, rotated on every disconnect
pub const DEFAULT_WS_HOSTS: [&str; 2] = [
    "wss://fstream.binance.com/ws",
    "wss://stream.binancefuture.com/ws",
];

/// Live feed configuration
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// Feed host base URLs (stream name is appended)
    pub hosts: Vec<String>,
    /// Delay before reconnecting after a close or error
    pub reconnect_delay: Duration,
    /// Maximum channel buffer size for candles
    pub channel_buffer_size: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            hosts: DEFAULT_WS_HOSTS.iter().map(|h| h.to_string()).collect(),
            reconnect_delay: Duration::from_secs(3),
            channel_buffer_size: 1000,
        }
    }
}

impl WebSocketConfig {
    /// Create a new configuration with custom hosts
    pub fn new(hosts: Vec<String>) -> Self {
        Self {
            hosts,
            ..Default::default()
        }
    }

    /// Set reconnect delay
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Set channel buffer size
    pub fn with_channel_buffer_size(mut self, size: usize) -> Self {
        self.channel_buffer_size = size;
        self
    }
}

/// Stream name for a symbol/interval pair, e.g. `ethusdt@kline_1m`
pub fn stream_name(symbol: &str, interval: Interval) -> String {
    format!("{}@kline_{}", symbol.to_lowercase(), interval.as_str())
}

/// Connection status updates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    Connecting,
    Disconnected,
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }
}

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    Disconnected,
    Connecting { host: usize },
    Connected { host: usize },
    ReconnectScheduled { host: usize },
}

/// Inputs to the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedEvent {
    Start,
    Opened,
    Closed,
    Errored,
    RetryElapsed,
    Cancel,
}

/// What the driver must do next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedAction {
    Connect(String),
    ScheduleRetry(Duration),
    Idle,
    Shutdown,
}

/// Reconnect and host rotation policy for one stream
#[derive(Debug, Clone)]
pub struct FeedSession {
    hosts: Vec<String>,
    stream: String,
    reconnect_delay: Duration,
    state: FeedState,
    next_host: usize,
    attempts: u64,
    cancelled: bool,
}

impl FeedSession {
    pub fn new(hosts: Vec<String>, stream: impl Into<String>, reconnect_delay: Duration) -> Self {
        Self {
            hosts,
            stream: stream.into(),
            reconnect_delay,
            state: FeedState::Disconnected,
            next_host: 0,
            attempts: 0,
            cancelled: false,
        }
    }

    pub fn state(&self) -> FeedState {
        self.state
    }

    pub fn status(&self) -> ConnectionStatus {
        match self.state {
            FeedState::Connected { .. } => ConnectionStatus::Connected,
            FeedState::Connecting { .. } => ConnectionStatus::Connecting,
            FeedState::Disconnected | FeedState::ReconnectScheduled { .. } => {
                ConnectionStatus::Disconnected
            }
        }
    }

    /// Connection attempts made so far
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// URL of the host currently connecting/connected, if any
    pub fn current_url(&self) -> Option<String> {
        match self.state {
            FeedState::Connecting { host } | FeedState::Connected { host } => Some(self.url_for(host)),
            _ => None,
        }
    }

    fn url_for(&self, host: usize) -> String {
        let base = self.hosts[host % self.hosts.len()].trim_end_matches('/');
        format!("{}/{}", base, self.stream)
    }

    fn connect(&mut self, host: usize) -> FeedAction {
        self.state = FeedState::Connecting { host };
        self.attempts += 1;
        FeedAction::Connect(self.url_for(host))
    }

    /// Apply one event. Events that do not fit the current state are ignored.
    pub fn handle(&mut self, event: FeedEvent) -> FeedAction {
        if self.cancelled {
            return FeedAction::Shutdown;
        }
        if self.hosts.is_empty() {
            self.cancelled = true;
            self.state = FeedState::Disconnected;
            return FeedAction::Shutdown;
        }

        match (self.state, event) {
            (_, FeedEvent::Cancel) => {
                self.cancelled = true;
                self.state = FeedState::Disconnected;
                FeedAction::Shutdown
            }
            (FeedState::Disconnected, FeedEvent::Start) => self.connect(self.next_host),
            (FeedState::Connecting { host }, FeedEvent::Opened) => {
                self.state = FeedState::Connected { host };
                FeedAction::Idle
            }
            (
                FeedState::Connecting { host } | FeedState::Connected { host },
                FeedEvent::Closed | FeedEvent::Errored,
            ) => {
                self.next_host = (host + 1) % self.hosts.len();
                self.state = FeedState::ReconnectScheduled { host: self.next_host };
                FeedAction::ScheduleRetry(self.reconnect_delay)
            }
            (FeedState::ReconnectScheduled { host }, FeedEvent::RetryElapsed) => self.connect(host),
            _ => FeedAction::Idle,
        }
    }
}

/// Handle to a running live feed
///
/// Dropping the handle cancels the feed.
pub struct LiveFeed {
    candle_rx: mpsc::Receiver<Candle>,
    status_rx: watch::Receiver<ConnectionStatus>,
    cancel_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl LiveFeed {
    /// Next buffered candle without waiting
    pub fn try_next(&mut self) -> Option<Candle> {
        self.candle_rx.try_recv().ok()
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status_rx.borrow()
    }

    /// Stop the feed: clears any pending reconnect and closes the socket
    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(true);
        self.task.abort();
    }
}

impl Drop for LiveFeed {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Start streaming `symbol`/`interval` klines
pub fn spawn_live_feed(config: &WebSocketConfig, symbol: &str, interval: Interval) -> LiveFeed {
    let (candle_tx, candle_rx) = mpsc::channel(config.channel_buffer_size);
    let (status_tx, status_rx) = watch::channel(ConnectionStatus::Disconnected);
    let (cancel_tx, cancel_rx) = watch::channel(false);

    let session = FeedSession::new(
        config.hosts.clone(),
        stream_name(symbol, interval),
        config.reconnect_delay,
    );
    let task = tokio::spawn(run_feed_loop(session, candle_tx, status_tx, cancel_rx));

    LiveFeed {
        candle_rx,
        status_rx,
        cancel_tx,
        task,
    }
}

async fn wait_cancelled(cancel_rx: &mut watch::Receiver<bool>) {
    // A dropped sender also means the handle is gone
    let _ = cancel_rx.wait_for(|cancelled| *cancelled).await;
}

/// Main connection loop driven by the session's actions
async fn run_feed_loop(
    mut session: FeedSession,
    candle_tx: mpsc::Sender<Candle>,
    status_tx: watch::Sender<ConnectionStatus>,
    mut cancel_rx: watch::Receiver<bool>,
) {
    let mut action = session.handle(FeedEvent::Start);

    loop {
        let _ = status_tx.send(session.status());

        let event = match action {
            FeedAction::Connect(url) => {
                info!("Connecting to kline stream {} (attempt {})", url, session.attempts());
                tokio::select! {
                    _ = wait_cancelled(&mut cancel_rx) => FeedEvent::Cancel,
                    result = connect_async(url.as_str()) => match result {
                        Ok((ws_stream, _)) => {
                            info!("Connected to kline stream {}", url);
                            session.handle(FeedEvent::Opened);
                            let _ = status_tx.send(session.status());

                            let (_, mut read) = ws_stream.split();
                            tokio::select! {
                                _ = wait_cancelled(&mut cancel_rx) => FeedEvent::Cancel,
                                event = read_stream(&mut read, &candle_tx) => event,
                            }
                        }
                        Err(e) => {
                            error!("{}", FeedError::Connect(format!("{}: {}", url, e)));
                            FeedEvent::Errored
                        }
                    },
                }
            }
            FeedAction::ScheduleRetry(delay) => {
                warn!(
                    "Kline stream down, retrying in {:?} via {}",
                    delay,
                    session.hosts[session.next_host]
                );
                tokio::select! {
                    _ = wait_cancelled(&mut cancel_rx) => FeedEvent::Cancel,
                    _ = tokio::time::sleep(delay) => FeedEvent::RetryElapsed,
                }
            }
            FeedAction::Idle => {
                error!("Feed session stalled in state {:?}", session.state());
                break;
            }
            FeedAction::Shutdown => break,
        };

        action = session.handle(event);
    }

    let _ = status_tx.send(ConnectionStatus::Disconnected);
    info!("Kline stream {} stopped", session.stream);
}

/// Forward candles until the socket closes or fails
async fn read_stream<S>(read: &mut S, candle_tx: &mpsc::Sender<Candle>) -> FeedEvent
where
    S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Text(text)) => match parse_stream_candle(&text) {
                Ok(candle) => {
                    if candle_tx.send(candle).await.is_err() {
                        warn!("Candle receiver dropped, stopping feed");
                        return FeedEvent::Cancel;
                    }
                }
                Err(e) => {
                    debug!(
                        "{} - {}",
                        FeedError::Parse(e.to_string()),
                        text.chars().take(100).collect::<String>()
                    );
                }
            },
            Ok(Message::Close(frame)) => {
                info!("Server closed kline stream: {:?}", frame);
                return FeedEvent::Closed;
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                // Heartbeat - tungstenite answers pings automatically
            }
            Err(e) => {
                error!("{}", FeedError::from(e));
                return FeedEvent::Errored;
            }
            _ => {}
        }
    }
    FeedEvent::Closed
}
