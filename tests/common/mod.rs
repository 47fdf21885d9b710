#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tradecore::domain::candle::Candle;
use tradecore::domain::error::TradecoreError;
use tradecore::domain::parameters::{ParameterStore, StrategyParameters};
use tradecore::domain::signal::{Signal, SignalType};
use tradecore::ports::account_port::AccountPort;
use tradecore::ports::candle_port::CandleSource;
use tradecore::ports::signal_port::SignalSink;

pub struct MockCandleSource {
    pub data: HashMap<String, Vec<Candle>>,
    pub errors: HashMap<String, String>,
    cursors: Mutex<HashMap<String, usize>>,
}

impl MockCandleSource {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
            cursors: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_candles(mut self, symbol: &str, candles: Vec<Candle>) -> Self {
        self.data.insert(symbol.to_string(), candles);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }

    fn check(&self, symbol: &str) -> Result<(), TradecoreError> {
        match self.errors.get(symbol) {
            Some(reason) => Err(TradecoreError::CandleSource {
                symbol: symbol.to_string(),
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl CandleSource for MockCandleSource {
    fn latest(&self, symbol: &str) -> Result<Option<Candle>, TradecoreError> {
        self.check(symbol)?;
        let mut cursors = self.cursors.lock().unwrap();
        let cursor = cursors.entry(symbol.to_string()).or_insert(0);
        let next = self
            .data
            .get(symbol)
            .and_then(|candles| candles.get(*cursor))
            .cloned();
        if next.is_some() {
            *cursor += 1;
        }
        Ok(next)
    }

    fn history(&self, symbol: &str, limit: usize) -> Result<Vec<Candle>, TradecoreError> {
        self.check(symbol)?;
        let replayed = self.cursors.lock().unwrap().get(symbol).copied().unwrap_or(0);
        let mut history: Vec<Candle> = self
            .data
            .get(symbol)
            .map(|candles| candles[..replayed].to_vec())
            .unwrap_or_default();
        history.sort_by_key(|c| c.timestamp);
        history.dedup_by_key(|c| c.timestamp);
        let skip = history.len().saturating_sub(limit);
        Ok(history.split_off(skip))
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub signals: Mutex<Vec<Signal>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Vec<Signal> {
        self.signals.lock().unwrap().clone()
    }

    pub fn types(&self) -> Vec<SignalType> {
        self.recorded().iter().map(Signal::signal_type).collect()
    }
}

impl SignalSink for RecordingSink {
    fn persist(&self, signal: &Signal) -> Result<(), TradecoreError> {
        self.signals.lock().unwrap().push(signal.clone());
        Ok(())
    }
}

pub struct FailingSink;

impl SignalSink for FailingSink {
    fn persist(&self, _signal: &Signal) -> Result<(), TradecoreError> {
        Err(TradecoreError::Persistence {
            reason: "disk full".into(),
        })
    }
}

pub struct MockAccount {
    pub equity: f64,
    pub positions: HashMap<String, f64>,
    pub failing: HashSet<String>,
    pub equity_error: bool,
}

impl MockAccount {
    pub fn new(equity: f64) -> Self {
        Self {
            equity,
            positions: HashMap::new(),
            failing: HashSet::new(),
            equity_error: false,
        }
    }

    pub fn with_position(mut self, symbol: &str, quantity: f64) -> Self {
        self.positions.insert(symbol.to_string(), quantity);
        self
    }

    pub fn with_equity_error(mut self) -> Self {
        self.equity_error = true;
        self
    }
}

impl AccountPort for MockAccount {
    fn equity(&self) -> Result<f64, TradecoreError> {
        if self.equity_error {
            return Err(TradecoreError::Account {
                reason: "balance endpoint unavailable".into(),
            });
        }
        Ok(self.equity)
    }

    fn position(&self, symbol: &str) -> Result<f64, TradecoreError> {
        Ok(self.positions.get(symbol).copied().unwrap_or(0.0))
    }
}

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

pub fn make_candle(symbol: &str, minute: i64, close: f64) -> Candle {
    Candle {
        symbol: symbol.to_string(),
        timestamp: start() + Duration::minutes(minute),
        open: close,
        high: close + 1.0,
        low: close - 1.0,
        close,
        volume: 1.0,
    }
}

pub fn make_candles(symbol: &str, closes: &[f64]) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| make_candle(symbol, i as i64, close))
        .collect()
}

/// 20 zig-zag steps up (+3.0 / -1.5) then 10 down (-3.0 / +1.0), from 100.
pub fn ramp_closes() -> Vec<f64> {
    let mut price = 100.0;
    let mut closes = Vec::with_capacity(30);
    for i in 0..20 {
        price += if i % 2 == 0 { 3.0 } else { -1.5 };
        closes.push(price);
    }
    for i in 0..10 {
        price -= if i % 2 == 0 { 3.0 } else { -1.0 };
        closes.push(price);
    }
    closes
}

/// EMA 3/8, RSI 14, ATR 14; everything else default.
pub fn scenario_params() -> StrategyParameters {
    StrategyParameters {
        ema_fast_period: 3,
        ema_slow_period: 8,
        rsi_period: 14,
        atr_period: 14,
        window_capacity: 50,
        ..StrategyParameters::default()
    }
}

pub fn scenario_store() -> Arc<ParameterStore> {
    Arc::new(ParameterStore::new(scenario_params()).unwrap())
}
