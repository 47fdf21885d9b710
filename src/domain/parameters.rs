//! Strategy parameters and the shared parameter store.
//!
//! [`ParameterStore`] is the only owner of the live parameters. Readers take an
//! `Arc` snapshot once per tick, so a concurrent replacement is observed either
//! entirely or not at all. Writers validate first and swap the whole snapshot.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::domain::config_validation::validate_parameters;
use crate::domain::error::{TradecoreError, ValidationError};
use crate::ports::config_port::ConfigPort;

const SECTION: &str = "strategy";

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyParameters {
    pub ema_fast_period: usize,
    pub ema_slow_period: usize,
    pub rsi_period: usize,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub atr_period: usize,
    pub atr_stop_multiplier: f64,
    pub reward_risk_ratio: f64,
    pub max_position_ratio: f64,
    pub min_order_amount: f64,
    /// Smallest tradable quantity step.
    pub lot_size: f64,
    pub kelly_payoff_ratio: f64,
    /// Resolved outcomes needed before the Kelly estimate replaces the
    /// bootstrap fraction.
    pub kelly_min_samples: usize,
    pub neutral_win_rate: f64,
    pub window_capacity: usize,
    pub target_symbols: Vec<String>,
}

impl Default for StrategyParameters {
    fn default() -> Self {
        StrategyParameters {
            ema_fast_period: 20,
            ema_slow_period: 60,
            rsi_period: 14,
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            atr_period: 14,
            atr_stop_multiplier: 2.0,
            reward_risk_ratio: 2.0,
            max_position_ratio: 0.2,
            min_order_amount: 5_000.0,
            lot_size: 0.0001,
            kelly_payoff_ratio: 1.8,
            kelly_min_samples: 20,
            neutral_win_rate: 0.5,
            window_capacity: 200,
            target_symbols: vec!["BTC_KRW".to_string()],
        }
    }
}

impl StrategyParameters {
    /// Candles needed before every indicator is defined. RSI needs one more
    /// close than its period because it works on price changes.
    pub fn required_history(&self) -> usize {
        self.ema_fast_period
            .max(self.ema_slow_period)
            .max(self.rsi_period + 1)
            .max(self.atr_period)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_parameters(self)
    }

    /// Read `[strategy]` keys, falling back to defaults for absent keys.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, TradecoreError> {
        let d = StrategyParameters::default();
        let target_symbols = match config.get_string(SECTION, "target_symbols") {
            Some(raw) => parse_symbols(&raw).map_err(|e| TradecoreError::ConfigInvalid {
                section: SECTION.into(),
                key: "target_symbols".into(),
                reason: e.reason,
            })?,
            None => d.target_symbols.clone(),
        };

        Ok(StrategyParameters {
            ema_fast_period: read_count(config, "ema_fast_period", d.ema_fast_period)?,
            ema_slow_period: read_count(config, "ema_slow_period", d.ema_slow_period)?,
            rsi_period: read_count(config, "rsi_period", d.rsi_period)?,
            rsi_overbought: read_double(config, "rsi_overbought", d.rsi_overbought)?,
            rsi_oversold: read_double(config, "rsi_oversold", d.rsi_oversold)?,
            atr_period: read_count(config, "atr_period", d.atr_period)?,
            atr_stop_multiplier: read_double(
                config,
                "atr_stop_multiplier",
                d.atr_stop_multiplier,
            )?,
            reward_risk_ratio: read_double(config, "reward_risk_ratio", d.reward_risk_ratio)?,
            max_position_ratio: read_double(config, "max_position_ratio", d.max_position_ratio)?,
            min_order_amount: read_double(config, "min_order_amount", d.min_order_amount)?,
            lot_size: read_double(config, "lot_size", d.lot_size)?,
            kelly_payoff_ratio: read_double(config, "kelly_payoff_ratio", d.kelly_payoff_ratio)?,
            kelly_min_samples: read_count(config, "kelly_min_samples", d.kelly_min_samples)?,
            neutral_win_rate: read_double(config, "neutral_win_rate", d.neutral_win_rate)?,
            window_capacity: read_count(config, "window_capacity", d.window_capacity)?,
            target_symbols,
        })
    }
}

// Negative values map to 0 so validation reports them instead of wrapping.
fn read_count(
    config: &dyn ConfigPort,
    key: &str,
    default: usize,
) -> Result<usize, TradecoreError> {
    Ok(config
        .get_int(SECTION, key)?
        .map_or(default, |raw| usize::try_from(raw).unwrap_or(0)))
}

fn read_double(config: &dyn ConfigPort, key: &str, default: f64) -> Result<f64, TradecoreError> {
    Ok(config.get_double(SECTION, key)?.unwrap_or(default))
}

/// Split a comma-separated symbol list, upper-casing each entry.
pub fn parse_symbols(input: &str) -> Result<Vec<String>, ValidationError> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::new(
                "target_symbols",
                "empty entry in symbol list",
            ));
        }
        let symbol = trimmed.to_uppercase();
        if !seen.insert(symbol.clone()) {
            return Err(ValidationError::new(
                "target_symbols",
                format!("duplicate symbol {symbol}"),
            ));
        }
        symbols.push(symbol);
    }

    Ok(symbols)
}

/// Shared, validated, read-mostly parameter holder.
#[derive(Debug)]
pub struct ParameterStore {
    current: RwLock<Arc<StrategyParameters>>,
    version: AtomicU64,
}

impl ParameterStore {
    pub fn new(params: StrategyParameters) -> Result<Self, ValidationError> {
        params.validate()?;
        Ok(ParameterStore {
            current: RwLock::new(Arc::new(params)),
            version: AtomicU64::new(1),
        })
    }

    /// One consistent view of the parameters. The lock is released on return.
    pub fn snapshot(&self) -> Arc<StrategyParameters> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Incremented on every accepted write.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    pub fn replace(&self, params: StrategyParameters) -> Result<(), ValidationError> {
        if let Err(e) = params.validate() {
            tracing::warn!(field = %e.field, reason = %e.reason, "parameter replacement rejected");
            return Err(e);
        }
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(params);
        let version = self.version.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::info!(version, "strategy parameters replaced");
        Ok(())
    }

    /// Apply a partial edit to a copy of the current parameters and swap it in
    /// if the result validates. The write lock is held for the whole edit so
    /// concurrent updates cannot overwrite each other.
    pub fn update<F>(&self, edit: F) -> Result<(), ValidationError>
    where
        F: FnOnce(&mut StrategyParameters),
    {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = StrategyParameters::clone(&guard);
        edit(&mut next);
        if let Err(e) = next.validate() {
            tracing::warn!(field = %e.field, reason = %e.reason, "parameter update rejected");
            return Err(e);
        }
        *guard = Arc::new(next);
        let version = self.version.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::info!(version, "strategy parameters updated");
        Ok(())
    }
}
