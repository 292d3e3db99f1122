//! Bollinger Bands over candle closes
//!
//! Rolling mean and population standard deviation (ddof = 0), computed with a
//! running sum and sum of squares so each step after warm-up is O(1).

use crate::shared::types::{BandPoint, Candle};

/// Default band window
pub const DEFAULT_BB_PERIOD: usize = 20;
/// Default standard deviation multiplier
pub const DEFAULT_BB_MULT: f64 = 2.0;

/// Band period and multiplier
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandSettings {
    pub period: usize,
    pub multiplier: f64,
}

impl Default for BandSettings {
    fn default() -> Self {
        Self {
            period: DEFAULT_BB_PERIOD,
            multiplier: DEFAULT_BB_MULT,
        }
    }
}

impl BandSettings {
    pub fn new(period: usize, multiplier: f64) -> Self {
        Self { period, multiplier }
    }

    /// Shift the period by `delta`, never below 2
    pub fn step_period(self, delta: i64) -> Self {
        let period = (self.period as i64 + delta).max(2) as usize;
        Self { period, ..self }
    }

    /// Shift the multiplier by `delta`, never below 0.1
    pub fn step_multiplier(self, delta: f64) -> Self {
        let multiplier = ((self.multiplier + delta) * 10.0).round() / 10.0;
        Self {
            multiplier: multiplier.max(0.1),
            ..self
        }
    }
}

/// Upper, middle and lower band series, index-aligned
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bands {
    pub upper: Vec<BandPoint>,
    pub mid: Vec<BandPoint>,
    pub lower: Vec<BandPoint>,
}

impl Bands {
    pub fn len(&self) -> usize {
        self.mid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mid.is_empty()
    }

    /// Aligned triple at `idx`
    pub fn sample(&self, idx: usize) -> Option<BandSample> {
        Some(BandSample {
            time: self.mid.get(idx)?.time,
            upper: self.upper.get(idx)?.value,
            mid: self.mid.get(idx)?.value,
            lower: self.lower.get(idx)?.value,
        })
    }

    pub fn last(&self) -> Option<BandSample> {
        self.sample(self.len().checked_sub(1)?)
    }
}

/// One aligned band triple
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandSample {
    pub time: i64,
    pub upper: f64,
    pub mid: f64,
    pub lower: f64,
}

impl BandSample {
    /// (upper - lower) / close
    pub fn bandwidth(&self, close: f64) -> Option<f64> {
        if close == 0.0 {
            return None;
        }
        Some((self.upper - self.lower) / close)
    }

    /// Position of `close` inside the bands: 0 = lower, 1 = upper
    pub fn percent_b(&self, close: f64) -> Option<f64> {
        let width = self.upper - self.lower;
        if width.abs() < f64::EPSILON {
            return None;
        }
        Some((close - self.lower) / width)
    }
}

/// Compute Bollinger Bands for every candle with a full window behind it.
///
/// Emits `len - period + 1` points per series when `len >= period`, nothing otherwise.
pub fn bollinger_bands(candles: &[Candle], period: usize, multiplier: f64) -> Bands {
    let mut bands = Bands::default();
    if period == 0 || candles.len() < period {
        return bands;
    }

    let capacity = candles.len() - period + 1;
    bands.upper.reserve(capacity);
    bands.mid.reserve(capacity);
    bands.lower.reserve(capacity);

    // Sums run over offsets from the first close so a flat series stays exactly flat
    let anchor = candles[0].close;
    let n = period as f64;
    let mut sum = 0.0;
    let mut sum_sq = 0.0;

    for (i, candle) in candles.iter().enumerate() {
        let offset = candle.close - anchor;
        sum += offset;
        sum_sq += offset * offset;

        if i >= period {
            let drop = candles[i - period].close - anchor;
            sum -= drop;
            sum_sq -= drop * drop;
        }

        if i + 1 >= period {
            let mean_offset = sum / n;
            let variance = (sum_sq / n - mean_offset * mean_offset).max(0.0);
            let sd = variance.sqrt();
            let mean = anchor + mean_offset;

            bands.mid.push(BandPoint { time: candle.time, value: mean });
            bands.upper.push(BandPoint { time: candle.time, value: mean + multiplier * sd });
            bands.lower.push(BandPoint { time: candle.time, value: mean - multiplier * sd });
        }
    }

    bands
}

/// Band point for the newest candle, computed from the trailing `period` candles only
pub fn tail_band_sample(candles: &[Candle], period: usize, multiplier: f64) -> Option<BandSample> {
    if period == 0 || candles.len() < period {
        return None;
    }
    let tail = &candles[candles.len() - period..];
    bollinger_bands(tail, period, multiplier).last()
}
