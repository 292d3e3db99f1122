use thiserror::Error;

/// Failure of a single historical kline request.
///
/// Every variant is handled the same way by the loader: move on to the next mirror.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("HTTP request failed: {0}")]
    Transport(String),

    #[error("HTTP error: {0}")]
    Status(u16),

    #[error("malformed kline response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            Self::Timeout
        } else if let Some(status) = value.status() {
            Self::Status(status.as_u16())
        } else {
            Self::Transport(value.to_string())
        }
    }
}

/// Live feed failure. Any of these ends the current connection and schedules a reconnect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    #[error("failed to connect: {0}")]
    Connect(String),

    #[error("WebSocket error: {0}")]
    Socket(String),

    #[error("failed to parse kline message: {0}")]
    Parse(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for FeedError {
    fn from(value: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Socket(value.to_string())
    }
}

/// Invalid configuration value read from the environment
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unsupported kline interval: {0}")]
    Interval(String),

    #[error("invalid value for {key}: {value}")]
    Value { key: &'static str, value: String },

    #[error("invalid URL {url}: {reason}")]
    Url { url: String, reason: String },

    #[error("{0} must list at least one host")]
    EmptyList(&'static str),
}
