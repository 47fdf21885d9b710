//! Signal sink used when no database is configured. Signals are counted and
//! dropped.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::domain::error::TradecoreError;
use crate::domain::signal::{Signal, SignalType};
use crate::ports::signal_port::SignalSink;

#[derive(Debug, Default)]
pub struct CountingSignalSink {
    actionable: AtomicU64,
    holds: AtomicU64,
}

impl CountingSignalSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// BUY and SELL signals seen.
    pub fn actionable(&self) -> u64 {
        self.actionable.load(Ordering::Relaxed)
    }

    pub fn holds(&self) -> u64 {
        self.holds.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> u64 {
        self.actionable() + self.holds()
    }
}

impl SignalSink for CountingSignalSink {
    fn persist(&self, signal: &Signal) -> Result<(), TradecoreError> {
        let counter = match signal.signal_type() {
            SignalType::Hold => &self.holds,
            SignalType::Buy | SignalType::Sell => &self.actionable,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
