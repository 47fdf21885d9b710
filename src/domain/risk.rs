//! Position sizing and stop placement.
//!
//! BUY sizing uses a fractional Kelly estimate capped at `max_position_ratio`.
//! Until `kelly_min_samples` outcomes are resolved there is no meaningful win
//! rate, so the bootstrap fraction is `max_position_ratio` itself. That is a
//! sizing policy, not a Kelly result.
//!
//! SELL closes the current long: the size is the held quantity floored to the
//! lot size.

use super::parameters::StrategyParameters;
use super::performance::PerformanceStats;
use super::signal::SignalType;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssessmentRequest {
    pub signal_type: SignalType,
    pub price: f64,
    pub atr: f64,
    pub equity: f64,
    pub current_position: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskAssessment {
    pub position_size: f64,
    pub stop_price: f64,
    pub take_profit_price: f64,
    pub risk_amount: f64,
}

impl RiskAssessment {
    pub fn notional(&self, price: f64) -> f64 {
        self.position_size * price
    }
}

/// Why a BUY/SELL could not be sized. The engine downgrades to HOLD.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SizingRejection {
    #[error("order notional {notional:.2} is below the minimum {minimum:.2}")]
    BelowMinimum { notional: f64, minimum: f64 },

    #[error("insufficient equity ({equity})")]
    InsufficientEquity { equity: f64 },

    #[error("invalid price {price}")]
    InvalidPrice { price: f64 },

    #[error("{signal_type} signals are not sized")]
    NotActionable { signal_type: SignalType },
}

const CAP_CORRECTION_STEPS: usize = 8;

/// `win_rate - (1 - win_rate) / payoff_ratio`, floored at 0.
pub fn kelly_fraction(win_rate: f64, payoff_ratio: f64) -> f64 {
    if payoff_ratio <= 0.0 {
        return 0.0;
    }
    (win_rate - (1.0 - win_rate) / payoff_ratio).max(0.0)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RiskManager;

impl RiskManager {
    pub fn new() -> Self {
        RiskManager
    }

    pub fn assess(
        &self,
        request: &AssessmentRequest,
        params: &StrategyParameters,
        stats: &PerformanceStats,
    ) -> Result<RiskAssessment, SizingRejection> {
        if !request.price.is_finite() || request.price <= 0.0 {
            return Err(SizingRejection::InvalidPrice {
                price: request.price,
            });
        }
        if !(request.equity > 0.0) {
            return Err(SizingRejection::InsufficientEquity {
                equity: request.equity,
            });
        }

        let position_size = match request.signal_type {
            SignalType::Buy => self.buy_size(request, params, stats),
            SignalType::Sell => floor_to_lot(request.current_position, params.lot_size),
            SignalType::Hold => {
                return Err(SizingRejection::NotActionable {
                    signal_type: request.signal_type,
                });
            }
        };

        let notional = position_size * request.price;
        if position_size <= 0.0 || notional < params.min_order_amount {
            tracing::debug!(
                signal_type = %request.signal_type,
                position_size,
                notional,
                minimum = params.min_order_amount,
                "order below minimum"
            );
            return Err(SizingRejection::BelowMinimum {
                notional,
                minimum: params.min_order_amount,
            });
        }

        let atr = request.atr.max(0.0);
        let stop_distance = atr * params.atr_stop_multiplier;
        let target_distance = stop_distance * params.reward_risk_ratio;
        let (stop_price, take_profit_price) = match request.signal_type {
            SignalType::Sell => (
                request.price + stop_distance,
                (request.price - target_distance).max(0.0),
            ),
            _ => (
                (request.price - stop_distance).max(0.0),
                request.price + target_distance,
            ),
        };

        Ok(RiskAssessment {
            position_size,
            stop_price,
            take_profit_price,
            risk_amount: position_size * stop_distance,
        })
    }

    fn buy_size(
        &self,
        request: &AssessmentRequest,
        params: &StrategyParameters,
        stats: &PerformanceStats,
    ) -> f64 {
        let ratio = params.max_position_ratio;
        let resolved = stats.resolved();
        let fraction = if resolved < params.kelly_min_samples as u64 {
            ratio
        } else {
            let win_rate = stats.win_rate_or(params.neutral_win_rate);
            kelly_fraction(win_rate, params.kelly_payoff_ratio).min(ratio)
        };

        let cap = request.equity * ratio;
        let allocation = request.equity * fraction;
        let lot = params.lot_size;

        let mut units = (allocation / request.price / lot).floor();
        if !units.is_finite() {
            units = 0.0;
        }
        // Float rounding in the division can land a few ulps over the cap.
        // Above 2^53 a step of one unit is lost, so step relative to size.
        for _ in 0..CAP_CORRECTION_STEPS {
            if units <= 0.0 || units * lot * request.price <= cap {
                break;
            }
            units = (units - (units * 4.0 * f64::EPSILON).max(1.0)).floor();
        }
        if units * lot * request.price > cap {
            units = 0.0;
        }

        tracing::debug!(
            resolved,
            fraction,
            allocation,
            units,
            "buy sizing"
        );
        units.max(0.0) * lot
    }
}

fn floor_to_lot(quantity: f64, lot: f64) -> f64 {
    if !(quantity > 0.0) || !(lot > 0.0) {
        return 0.0;
    }
    (quantity / lot).floor() * lot
}
