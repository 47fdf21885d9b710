//! Market data port.

use crate::domain::candle::Candle;
use crate::domain::error::TradecoreError;

pub trait CandleSource {
    /// The newest candle not yet handed out for `symbol`, or `None` when the
    /// source has nothing new.
    fn latest(&self, symbol: &str) -> Result<Option<Candle>, TradecoreError>;

    /// Up to `limit` of the most recent candles, oldest first.
    fn history(&self, symbol: &str, limit: usize) -> Result<Vec<Candle>, TradecoreError>;
}
