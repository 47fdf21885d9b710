//! Signal persistence port.

use crate::domain::error::TradecoreError;
use crate::domain::signal::Signal;

/// Receives every emitted signal. Failures are reported by the engine and
/// never retried.
pub trait SignalSink {
    fn persist(&self, signal: &Signal) -> Result<(), TradecoreError>;
}
