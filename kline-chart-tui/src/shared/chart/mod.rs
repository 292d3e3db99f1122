//! Candlestick chart with Bollinger Band overlays
//!
//! Provides:
//! - Chart model with full replace and incremental upsert of candles and bands
//! - Ratatui widget for display

mod model;
mod widget;

pub use model::{CandleChart, PRICE_AXIS_WIDTH};
pub use widget::{CandleChartWidget, C_DOWN, C_UP};
