//! Chart data: one candle series plus upper/mid/lower band lines

use tracing::debug;

use crate::shared::indicators::{BandSample, Bands};
use crate::shared::types::{BandPoint, Candle};

/// Columns reserved for the price axis
pub const PRICE_AXIS_WIDTH: u16 = 11;

/// Candle series and band overlays as drawn on screen
#[derive(Debug, Clone, Default)]
pub struct CandleChart {
    candles: Vec<Candle>,
    bands: Bands,
    width: u16,
}

/// Upsert by time: replace same time, append newer, ignore older.
/// Returns false when the item was older than the series tail.
fn upsert<T, F>(series: &mut Vec<T>, item: T, time_of: F) -> bool
where
    F: Fn(&T) -> i64,
{
    let time = time_of(&item);
    match series.last_mut() {
        Some(last) if time_of(last) == time => {
            *last = item;
            true
        }
        Some(last) if time_of(last) > time => false,
        _ => {
            series.push(item);
            true
        }
    }
}

impl CandleChart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all data (historical load or interval switch)
    pub fn set_data(&mut self, candles: Vec<Candle>, bands: Bands) {
        self.candles = candles;
        self.bands = bands;
    }

    pub fn clear(&mut self) {
        self.candles.clear();
        self.bands = Bands::default();
    }

    /// Incremental candle update from a live tick
    pub fn update(&mut self, candle: Candle) -> bool {
        let applied = upsert(&mut self.candles, candle, |c| c.time);
        if !applied {
            debug!("Dropping stale candle at {} (chart tail is newer)", candle.time);
        }
        applied
    }

    /// Incremental update of the three band lines
    pub fn update_bands(&mut self, sample: BandSample) -> bool {
        let time = sample.time;
        let point = |value| BandPoint { time, value };
        let applied = upsert(&mut self.bands.upper, point(sample.upper), |p| p.time);
        upsert(&mut self.bands.mid, point(sample.mid), |p| p.time);
        upsert(&mut self.bands.lower, point(sample.lower), |p| p.time);
        applied
    }

    /// Record the container width
    pub fn resize(&mut self, width: u16) {
        if width != self.width {
            debug!("Chart resized from {} to {} columns", self.width, width);
            self.width = width;
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn bands(&self) -> &Bands {
        &self.bands
    }

    pub fn last_candle(&self) -> Option<&Candle> {
        self.candles.last()
    }

    /// Number of candles that fit next to the price axis
    pub fn visible_count(&self) -> usize {
        self.width.saturating_sub(PRICE_AXIS_WIDTH) as usize
    }

    /// Most recent candles that fit the current width
    pub fn visible_candles(&self) -> &[Candle] {
        let n = self.visible_count();
        &self.candles[self.candles.len().saturating_sub(n)..]
    }

    /// Band sample aligned to `time`, if one exists
    pub fn band_at(&self, time: i64) -> Option<BandSample> {
        let idx = self.bands.mid.binary_search_by_key(&time, |p| p.time).ok()?;
        self.bands.sample(idx)
    }
}
