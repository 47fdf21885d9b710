//! Indicator computation over a [`CandleWindow`].
//!
//! Each indicator is a streaming fold (`next` per candle). The engine keeps the
//! folded state between ticks and only feeds it the newest candle when the
//! window has simply advanced by one without evicting. Anything else (first
//! call, changed periods, a rebuilt window, an evicted or skipped candle)
//! replays the whole window, so the snapshot always matches a fresh
//! computation over exactly the retained candles.

pub mod atr;
pub mod ema;
pub mod rsi;
pub mod volume;

use chrono::{DateTime, Utc};

use self::atr::Atr;
use self::ema::Ema;
use self::rsi::Rsi;
use self::volume::VolumeAverage;
use crate::domain::candle::{Candle, CandleWindow};
use crate::domain::parameters::StrategyParameters;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSnapshot {
    pub ema_fast: f64,
    pub ema_slow: f64,
    pub rsi: f64,
    pub atr: f64,
    pub avg_volume: f64,
    /// Volume of the newest candle.
    pub volume: f64,
    pub timestamp: DateTime<Utc>,
}

impl IndicatorSnapshot {
    pub fn volume_ratio(&self) -> f64 {
        if self.avg_volume > 0.0 {
            self.volume / self.avg_volume
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IndicatorOutcome {
    Ready(IndicatorSnapshot),
    Insufficient { have: usize, need: usize },
}

impl IndicatorOutcome {
    pub fn ready(&self) -> Option<&IndicatorSnapshot> {
        match self {
            IndicatorOutcome::Ready(snapshot) => Some(snapshot),
            IndicatorOutcome::Insufficient { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Periods {
    fast: usize,
    slow: usize,
    rsi: usize,
    atr: usize,
}

impl From<&StrategyParameters> for Periods {
    fn from(params: &StrategyParameters) -> Self {
        Periods {
            fast: params.ema_fast_period,
            slow: params.ema_slow_period,
            rsi: params.rsi_period,
            atr: params.atr_period,
        }
    }
}

#[derive(Debug, Clone)]
struct StreamState {
    periods: Periods,
    generation: u64,
    /// Oldest candle the fold started from.
    first_timestamp: Option<DateTime<Utc>>,
    last_timestamp: Option<DateTime<Utc>>,
    last_volume: f64,
    ema_fast: Ema,
    ema_slow: Ema,
    rsi: Rsi,
    atr: Atr,
    volume: VolumeAverage,
}

impl StreamState {
    fn replay(periods: Periods, generation: u64, candles: &[Candle]) -> Self {
        let mut state = StreamState {
            periods,
            generation,
            first_timestamp: candles.first().map(|c| c.timestamp),
            last_timestamp: None,
            last_volume: 0.0,
            ema_fast: Ema::new(periods.fast),
            ema_slow: Ema::new(periods.slow),
            rsi: Rsi::new(periods.rsi),
            atr: Atr::new(periods.atr),
            volume: VolumeAverage::new(periods.atr),
        };
        for candle in candles {
            state.fold(candle);
        }
        state
    }

    fn fold(&mut self, candle: &Candle) {
        self.ema_fast.next(candle.close);
        self.ema_slow.next(candle.close);
        self.rsi.next(candle.close);
        self.atr.next(candle);
        self.volume.next(candle.volume);
        self.last_timestamp = Some(candle.timestamp);
        self.last_volume = candle.volume;
    }

    /// True when `candles` is what this state saw plus at most one new candle.
    /// An evicted head means the fold carries history the window no longer
    /// holds, so it does not extend.
    fn extends_to(&self, periods: Periods, generation: u64, candles: &[Candle]) -> bool {
        if self.periods != periods || self.generation != generation {
            return false;
        }
        if candles.first().map(|c| c.timestamp) != self.first_timestamp {
            return false;
        }
        let Some(folded) = self.last_timestamp else {
            return false;
        };
        match candles {
            [.., prev, newest] => prev.timestamp == folded || newest.timestamp == folded,
            [newest] => newest.timestamp == folded,
            [] => false,
        }
    }

    fn snapshot(&self) -> Option<IndicatorSnapshot> {
        Some(IndicatorSnapshot {
            ema_fast: self.ema_fast.value()?,
            ema_slow: self.ema_slow.value()?,
            rsi: self.rsi.value()?,
            atr: self.atr.value()?,
            avg_volume: self.volume.value()?,
            volume: self.last_volume,
            timestamp: self.last_timestamp?,
        })
    }
}

/// Per-symbol indicator state.
#[derive(Debug, Clone, Default)]
pub struct IndicatorEngine {
    state: Option<StreamState>,
    full_recomputes: u64,
}

impl IndicatorEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compute(&mut self, window: &CandleWindow, params: &StrategyParameters) -> IndicatorOutcome {
        let candles = window.snapshot();
        let periods = Periods::from(params);
        let generation = window.generation();

        let state = match self.state.take() {
            Some(mut state) if state.extends_to(periods, generation, candles) => {
                if let Some(newest) = candles.last() {
                    if state.last_timestamp != Some(newest.timestamp) {
                        state.fold(newest);
                    }
                }
                state
            }
            _ => {
                self.full_recomputes += 1;
                tracing::debug!(
                    symbol = window.symbol(),
                    candles = candles.len(),
                    generation,
                    "recomputing indicators from full window"
                );
                StreamState::replay(periods, generation, candles)
            }
        };

        let outcome = outcome_for(&state, candles.len(), params.required_history());
        self.state = Some(state);
        outcome
    }

    /// Number of times the state was rebuilt from the whole window.
    pub fn full_recomputes(&self) -> u64 {
        self.full_recomputes
    }
}

/// Indicators computed from scratch over `window`, ignoring any saved state.
pub fn compute_full(window: &CandleWindow, params: &StrategyParameters) -> IndicatorOutcome {
    let candles = window.snapshot();
    let state = StreamState::replay(Periods::from(params), window.generation(), candles);
    outcome_for(&state, candles.len(), params.required_history())
}

fn outcome_for(state: &StreamState, have: usize, need: usize) -> IndicatorOutcome {
    if have < need {
        return IndicatorOutcome::Insufficient { have, need };
    }
    match state.snapshot() {
        Some(snapshot) => IndicatorOutcome::Ready(snapshot),
        None => IndicatorOutcome::Insufficient { have, need },
    }
}
