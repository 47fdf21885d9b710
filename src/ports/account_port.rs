//! Account balance port.

use crate::domain::error::TradecoreError;

pub trait AccountPort {
    fn equity(&self) -> Result<f64, TradecoreError>;

    /// Quantity currently held for `symbol`.
    fn position(&self, symbol: &str) -> Result<f64, TradecoreError>;
}
