//! Bounded live candle buffer fed by the kline stream
//!
//! The newest candle is the bar still forming: a tick with the same open time
//! replaces it in place, a tick with a new open time starts a new bar.

use std::collections::VecDeque;

use crate::shared::types::Candle;

/// Maximum candles kept in the live buffer
pub const LIVE_BUFFER_CAPACITY: usize = 1000;

/// What a merge did to the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Same open time as the last bar, replaced in place
    Replaced,
    /// New bar appended
    Appended,
}

/// Live candle buffer with last price and price change
#[derive(Debug, Clone)]
pub struct LiveSeries {
    bars: VecDeque<Candle>,
    capacity: usize,
    last_price: f64,
    price_change: f64,
}

impl Default for LiveSeries {
    fn default() -> Self {
        Self::new(LIVE_BUFFER_CAPACITY)
    }
}

impl LiveSeries {
    pub fn new(capacity: usize) -> Self {
        Self {
            bars: VecDeque::with_capacity(capacity.min(LIVE_BUFFER_CAPACITY)),
            capacity: capacity.max(1),
            last_price: 0.0,
            price_change: 0.0,
        }
    }

    /// Merge a streamed candle.
    ///
    /// The price change is taken against the last buffered close before that
    /// bar can be overwritten; an empty buffer leaves the change untouched.
    pub fn merge(&mut self, candle: Candle) -> MergeOutcome {
        if let Some(prev) = self.bars.back() {
            self.price_change = candle.close - prev.close;
        }
        self.last_price = candle.close;

        match self.bars.back_mut() {
            Some(last) if last.time == candle.time => {
                *last = candle;
                MergeOutcome::Replaced
            }
            _ => {
                self.bars.push_back(candle);
                while self.bars.len() > self.capacity {
                    self.bars.pop_front();
                }
                MergeOutcome::Appended
            }
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.bars.back()
    }

    pub fn last_price(&self) -> f64 {
        self.last_price
    }

    pub fn price_change(&self) -> f64 {
        self.price_change
    }

    /// Change relative to the price before the change, in percent
    pub fn change_percent(&self) -> f64 {
        let base = self.last_price - self.price_change;
        if self.last_price > 0.0 && base != 0.0 {
            self.price_change / base * 100.0
        } else {
            0.0
        }
    }

    /// Contiguous view of the most recent `n` candles (oldest first)
    pub fn tail(&mut self, n: usize) -> &[Candle] {
        let bars = self.bars.make_contiguous();
        &bars[bars.len().saturating_sub(n)..]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candle> {
        self.bars.iter()
    }

    pub fn clear(&mut self) {
        self.bars.clear();
        self.last_price = 0.0;
        self.price_change = 0.0;
    }
}
