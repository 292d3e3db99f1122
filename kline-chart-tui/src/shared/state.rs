//! View state owned by the UI loop.
//!
//! Applies historical loads and live ticks to the chart, the live buffer and
//! the band overlays. Only the UI loop touches it, so there is no locking.

use tracing::{debug, info};

use crate::shared::chart::CandleChart;
use crate::shared::history::{History, HistorySource};
use crate::shared::indicators::{bollinger_bands, tail_band_sample, BandSample, BandSettings};
use crate::shared::series::{LiveSeries, MergeOutcome};
use crate::shared::types::{Candle, Interval};
use crate::shared::websocket::ConnectionStatus;

#[derive(Debug)]
pub struct ViewState {
    pub symbol: String,
    pub interval: Interval,
    pub bands: BandSettings,
    pub chart: CandleChart,
    pub live: LiveSeries,
    pub status: ConnectionStatus,
    pub source: Option<HistorySource>,
    dirty: bool,
}

impl ViewState {
    pub fn new(symbol: impl Into<String>, interval: Interval, bands: BandSettings) -> Self {
        Self {
            symbol: symbol.into(),
            interval,
            bands,
            chart: CandleChart::new(),
            live: LiveSeries::default(),
            status: ConnectionStatus::Disconnected,
            source: None,
            dirty: true,
        }
    }

    /// Drop everything tied to the previous view; keeps the chart width
    pub fn reset(&mut self, interval: Interval, bands: BandSettings) {
        self.interval = interval;
        self.bands = bands;
        self.chart.clear();
        self.live.clear();
        self.status = ConnectionStatus::Disconnected;
        self.source = None;
        self.dirty = true;
    }

    /// Replace chart data with a historical load
    pub fn apply_history(&mut self, history: History) {
        let bands = bollinger_bands(&history.candles, self.bands.period, self.bands.multiplier);
        info!(
            "Chart loaded {} candles ({}) with {} band points",
            history.candles.len(),
            history.source.label(),
            bands.len()
        );
        self.chart.set_data(history.candles, bands);
        self.source = Some(history.source);
        self.dirty = true;
    }

    /// Merge a live tick and push the incremental chart updates
    pub fn apply_tick(&mut self, candle: Candle) -> MergeOutcome {
        let outcome = self.live.merge(candle);
        self.chart.update(candle);

        let period = self.bands.period;
        if self.live.len() >= period {
            let tail = self.live.tail(period);
            if let Some(sample) = tail_band_sample(tail, period, self.bands.multiplier) {
                self.chart.update_bands(sample);
            }
        }

        self.dirty = true;
        outcome
    }

    pub fn set_status(&mut self, status: ConnectionStatus) {
        if status != self.status {
            debug!("Connection status {:?} -> {:?}", self.status, status);
            self.status = status;
            self.dirty = true;
        }
    }

    /// Last streamed price, or the last loaded close before the first tick
    pub fn last_price(&self) -> f64 {
        if self.live.last_price() > 0.0 {
            self.live.last_price()
        } else {
            self.chart.last_candle().map(|c| c.close).unwrap_or(0.0)
        }
    }

    pub fn price_change(&self) -> f64 {
        self.live.price_change()
    }

    pub fn change_percent(&self) -> f64 {
        self.live.change_percent()
    }

    pub fn show_mock_badge(&self) -> bool {
        self.source.as_ref().is_some_and(HistorySource::is_mock)
    }

    /// Band values at the chart tail
    pub fn current_band(&self) -> Option<BandSample> {
        self.chart.bands().last()
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// True once per change; used to redraw on ticks rather than on a timer
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}
