//! Signals and the per-symbol crossover state machine.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::domain::indicator::IndicatorSnapshot;
use crate::domain::parameters::StrategyParameters;
use crate::domain::risk::RiskAssessment;

pub const REASON_GOLDEN_CROSS: &str = "ema golden cross";
pub const REASON_DEATH_CROSS: &str = "ema death cross";
pub const REASON_RSI_BELOW_OVERBOUGHT: &str = "rsi below overbought";
pub const REASON_RSI_OVERBOUGHT: &str = "rsi overbought";
pub const REASON_RSI_OVERSOLD: &str = "rsi oversold";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalType {
    Buy,
    Sell,
    Hold,
}

impl SignalType {
    pub fn as_str(self) -> &'static str {
        match self {
            SignalType::Buy => "BUY",
            SignalType::Sell => "SELL",
            SignalType::Hold => "HOLD",
        }
    }

    pub fn is_actionable(self) -> bool {
        !matches!(self, SignalType::Hold)
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BUY" => Ok(SignalType::Buy),
            "SELL" => Ok(SignalType::Sell),
            "HOLD" => Ok(SignalType::Hold),
            other => Err(format!("unknown signal type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PositionState {
    #[default]
    Neutral,
    Long,
    /// Just exited. Settles to Neutral on the first HOLD tick with fast <= slow.
    FlatPending,
}

/// Result of one state-machine step.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalDecision {
    pub signal_type: SignalType,
    pub strength: f64,
    pub reasons: Vec<String>,
}

/// EMA crossover state machine with RSI confirmation, one per symbol.
#[derive(Debug, Clone, Default)]
pub struct SignalGenerator {
    state: PositionState,
    prev_fast_above: bool,
}

impl SignalGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PositionState {
        self.state
    }

    pub fn prev_fast_above(&self) -> bool {
        self.prev_fast_above
    }

    /// Force the position state, e.g. when a position is already open at startup.
    pub fn restore(&mut self, state: PositionState) {
        self.state = state;
    }

    pub fn on_snapshot(
        &mut self,
        snapshot: &IndicatorSnapshot,
        params: &StrategyParameters,
    ) -> SignalDecision {
        let fast = snapshot.ema_fast;
        let slow = snapshot.ema_slow;

        // A tie keeps the previous relation, so touching is never a cross.
        let above = if fast > slow {
            true
        } else if fast < slow {
            false
        } else {
            self.prev_fast_above
        };
        let crossed_up = above && !self.prev_fast_above;
        let crossed_down = !above && self.prev_fast_above;
        self.prev_fast_above = above;

        let rsi_ok = snapshot.rsi < params.rsi_overbought;
        let mut reasons = Vec::new();

        let signal_type = if crossed_up
            && rsi_ok
            && matches!(self.state, PositionState::Neutral | PositionState::FlatPending)
        {
            reasons.push(REASON_GOLDEN_CROSS.to_string());
            reasons.push(REASON_RSI_BELOW_OVERBOUGHT.to_string());
            self.state = PositionState::Long;
            SignalType::Buy
        } else if crossed_down && self.state == PositionState::Long {
            reasons.push(REASON_DEATH_CROSS.to_string());
            self.state = PositionState::FlatPending;
            SignalType::Sell
        } else {
            if crossed_up {
                reasons.push(REASON_GOLDEN_CROSS.to_string());
            }
            if crossed_down {
                reasons.push(REASON_DEATH_CROSS.to_string());
            }
            if self.state == PositionState::FlatPending && fast <= slow {
                self.state = PositionState::Neutral;
            }
            SignalType::Hold
        };

        if !rsi_ok {
            reasons.push(REASON_RSI_OVERBOUGHT.to_string());
        } else if snapshot.rsi <= params.rsi_oversold {
            reasons.push(REASON_RSI_OVERSOLD.to_string());
        }

        let strength = match signal_type {
            SignalType::Hold => 0.0,
            _ => crossover_strength(fast, slow, snapshot.atr),
        };

        SignalDecision {
            signal_type,
            strength,
            reasons,
        }
    }
}

/// EMA gap measured in ATRs, capped at 1.
pub fn crossover_strength(fast: f64, slow: f64, atr: f64) -> f64 {
    if atr > 0.0 {
        ((fast - slow).abs() / atr).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// One emitted decision. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    symbol: String,
    signal_type: SignalType,
    strength: f64,
    price: f64,
    indicators: Option<IndicatorSnapshot>,
    risk_amount: f64,
    position_size: f64,
    stop_price: f64,
    take_profit_price: f64,
    original_signal_type: SignalType,
    reasons: Vec<String>,
    created_at: DateTime<Utc>,
}

impl Signal {
    pub fn builder(
        symbol: impl Into<String>,
        signal_type: SignalType,
        price: f64,
        created_at: DateTime<Utc>,
    ) -> SignalBuilder {
        SignalBuilder {
            signal: Signal {
                symbol: symbol.into(),
                signal_type,
                strength: 0.0,
                price,
                indicators: None,
                risk_amount: 0.0,
                position_size: 0.0,
                stop_price: 0.0,
                take_profit_price: 0.0,
                original_signal_type: signal_type,
                reasons: Vec::new(),
                created_at,
            },
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn signal_type(&self) -> SignalType {
        self.signal_type
    }

    pub fn strength(&self) -> f64 {
        self.strength
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn indicators(&self) -> Option<&IndicatorSnapshot> {
        self.indicators.as_ref()
    }

    pub fn risk_amount(&self) -> f64 {
        self.risk_amount
    }

    pub fn position_size(&self) -> f64 {
        self.position_size
    }

    pub fn stop_price(&self) -> f64 {
        self.stop_price
    }

    pub fn take_profit_price(&self) -> f64 {
        self.take_profit_price
    }

    /// The type the state machine produced before any sizing downgrade.
    pub fn original_signal_type(&self) -> SignalType {
        self.original_signal_type
    }

    pub fn reasons(&self) -> &[String] {
        &self.reasons
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn was_downgraded(&self) -> bool {
        self.signal_type != self.original_signal_type
    }

    pub fn volume_ratio(&self) -> f64 {
        self.indicators
            .as_ref()
            .map_or(0.0, IndicatorSnapshot::volume_ratio)
    }
}

#[derive(Debug, Clone)]
pub struct SignalBuilder {
    signal: Signal,
}

impl SignalBuilder {
    /// Clamped to [0, 1].
    pub fn strength(mut self, strength: f64) -> Self {
        self.signal.strength = if strength.is_nan() {
            0.0
        } else {
            strength.clamp(0.0, 1.0)
        };
        self
    }

    pub fn indicators(mut self, snapshot: IndicatorSnapshot) -> Self {
        self.signal.indicators = Some(snapshot);
        self
    }

    pub fn risk(mut self, assessment: &RiskAssessment) -> Self {
        self.signal.position_size = assessment.position_size;
        self.signal.stop_price = assessment.stop_price;
        self.signal.take_profit_price = assessment.take_profit_price;
        self.signal.risk_amount = assessment.risk_amount;
        self
    }

    pub fn original_signal_type(mut self, signal_type: SignalType) -> Self {
        self.signal.original_signal_type = signal_type;
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.signal.reasons.push(reason.into());
        self
    }

    pub fn reasons<I, S>(mut self, reasons: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.signal.reasons.extend(reasons.into_iter().map(Into::into));
        self
    }

    pub fn build(self) -> Signal {
        self.signal
    }
}
