//! Kline Proxy - CORS-friendly edge proxy for futures kline REST endpoints
//!
//! Forwards the inbound query string to an ordered list of upstream hosts and
//! returns the first successful body unchanged.

pub mod config;
pub mod error;
pub mod routes;
pub mod upstream;

pub use config::ProxyConfig;
pub use error::ProxyError;
pub use routes::{router, AppState};
pub use upstream::{forward, HttpUpstream, UpstreamClient};
