//! OHLCV candles and the per-symbol rolling window.

use chrono::{DateTime, Utc};

use super::error::OutOfOrder;

#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }

    /// All OHLCV fields are finite and non-negative.
    pub fn is_well_formed(&self) -> bool {
        [self.open, self.high, self.low, self.close, self.volume]
            .iter()
            .all(|v| v.is_finite() && *v >= 0.0)
    }
}

/// Fixed-capacity, strictly time-ordered candle history for one symbol.
///
/// Appends past capacity evict the oldest candle. Evicted candles stay in the
/// buffer until `capacity` of them pile up and are drained together, so
/// eviction is amortised O(1) and the retained candles are one slice. The
/// window is single-writer; the owning engine serialises access.
#[derive(Debug, Clone)]
pub struct CandleWindow {
    symbol: String,
    capacity: usize,
    candles: Vec<Candle>,
    /// Index of the oldest retained candle in `candles`.
    start: usize,
    generation: u64,
}

impl CandleWindow {
    pub fn new(symbol: impl Into<String>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            symbol: symbol.into(),
            capacity,
            candles: Vec::with_capacity(capacity * 2),
            start: 0,
            generation: 0,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.candles.len() - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    /// Bumped by every [`CandleWindow::rebuild`]; never by `append`.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn append(&mut self, candle: Candle) -> Result<(), OutOfOrder> {
        if let Some(last) = self.candles.last() {
            if candle.timestamp <= last.timestamp {
                return Err(OutOfOrder {
                    symbol: self.symbol.clone(),
                    last: last.timestamp,
                    received: candle.timestamp,
                });
            }
        }
        self.candles.push(candle);
        if self.len() > self.capacity {
            self.start += 1;
            if self.start >= self.capacity {
                self.candles.drain(..self.start);
                self.start = 0;
            }
        }
        Ok(())
    }

    /// Ordered view of the retained candles. Not stable across the next append.
    pub fn snapshot(&self) -> &[Candle] {
        &self.candles[self.start..]
    }

    /// Replace the window content with a fresh history.
    ///
    /// The history must be strictly increasing; on error the window is left
    /// untouched. Only the newest `capacity` candles are retained.
    pub fn rebuild(&mut self, history: Vec<Candle>) -> Result<(), OutOfOrder> {
        for pair in history.windows(2) {
            if pair[1].timestamp <= pair[0].timestamp {
                return Err(OutOfOrder {
                    symbol: self.symbol.clone(),
                    last: pair[0].timestamp,
                    received: pair[1].timestamp,
                });
            }
        }
        let skip = history.len().saturating_sub(self.capacity);
        self.candles = history.into_iter().skip(skip).collect();
        self.start = 0;
        self.generation += 1;
        Ok(())
    }
}
