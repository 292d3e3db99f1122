/// Kline Chart TUI - Shared Library
///
/// Terminal candlestick viewer for futures klines:
/// - Historical loader with REST mirror failover and a mock fallback
/// - Live kline stream with host rotation on reconnect
/// - Bollinger Bands computed over history and updated per tick
/// - Chart and side panels rendered with ratatui
pub mod shared;

// Re-export commonly used types for convenience
pub use shared::types::{Candle, Interval};

pub use shared::config::ViewerConfig;
pub use shared::error::{ConfigError, FeedError, FetchError};
pub use shared::websocket::ConnectionStatus;
pub use shared::websocket::{spawn_live_feed, LiveFeed, WebSocketConfig};

pub use shared::history::{History, HistoryLoader, HistoryRequest, HistorySource, KlineFetcher, RestKlineFetcher};
pub use shared::indicators::{bollinger_bands, BandSettings, Bands};
pub use shared::session::ViewSession;
pub use shared::state::ViewState;
