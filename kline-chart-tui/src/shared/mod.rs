/// Shared modules for the kline chart viewer
pub mod chart;
pub mod config;
pub mod error;
pub mod history;
pub mod indicators;
pub mod panels;
pub mod series;
pub mod session;
pub mod state;
pub mod types;
pub mod websocket;
