//! Strategy parameter validation.
//!
//! Every write to the parameter store goes through [`validate_parameters`];
//! the first failing rule wins.

use std::collections::HashSet;

use crate::domain::error::{TradecoreError, ValidationError};
use crate::domain::parameters::StrategyParameters;
use crate::ports::config_port::ConfigPort;

pub fn validate_parameters(params: &StrategyParameters) -> Result<(), ValidationError> {
    validate_periods(params)?;
    validate_ema_order(params)?;
    validate_rsi_bounds(params)?;
    validate_stop_settings(params)?;
    validate_position_ratio(params)?;
    validate_order_limits(params)?;
    validate_kelly(params)?;
    validate_window(params)?;
    validate_symbols(params)?;
    Ok(())
}

/// Load `[strategy]` from config and validate it.
pub fn validate_strategy_config(
    config: &dyn ConfigPort,
) -> Result<StrategyParameters, TradecoreError> {
    let params = StrategyParameters::from_config(config)?;
    validate_parameters(&params)?;
    Ok(params)
}

fn validate_periods(params: &StrategyParameters) -> Result<(), ValidationError> {
    let periods = [
        ("ema_fast_period", params.ema_fast_period),
        ("ema_slow_period", params.ema_slow_period),
        ("rsi_period", params.rsi_period),
        ("atr_period", params.atr_period),
    ];
    for (field, value) in periods {
        if value == 0 {
            return Err(ValidationError::new(field, "must be positive"));
        }
    }
    Ok(())
}

fn validate_ema_order(params: &StrategyParameters) -> Result<(), ValidationError> {
    if params.ema_fast_period >= params.ema_slow_period {
        return Err(ValidationError::new(
            "ema_fast_period",
            format!(
                "fast period {} must be less than slow period {}",
                params.ema_fast_period, params.ema_slow_period
            ),
        ));
    }
    Ok(())
}

fn validate_rsi_bounds(params: &StrategyParameters) -> Result<(), ValidationError> {
    if !(0.0..=100.0).contains(&params.rsi_overbought) {
        return Err(ValidationError::new(
            "rsi_overbought",
            "must be between 0 and 100",
        ));
    }
    if !(0.0..=100.0).contains(&params.rsi_oversold) {
        return Err(ValidationError::new(
            "rsi_oversold",
            "must be between 0 and 100",
        ));
    }
    if params.rsi_oversold >= params.rsi_overbought {
        return Err(ValidationError::new(
            "rsi_oversold",
            "must be less than rsi_overbought",
        ));
    }
    Ok(())
}

fn validate_stop_settings(params: &StrategyParameters) -> Result<(), ValidationError> {
    if !(params.atr_stop_multiplier > 0.0) {
        return Err(ValidationError::new(
            "atr_stop_multiplier",
            "must be positive",
        ));
    }
    if !(params.reward_risk_ratio > 0.0) {
        return Err(ValidationError::new("reward_risk_ratio", "must be positive"));
    }
    Ok(())
}

fn validate_position_ratio(params: &StrategyParameters) -> Result<(), ValidationError> {
    let ratio = params.max_position_ratio;
    if !(ratio > 0.0 && ratio <= 1.0) {
        return Err(ValidationError::new(
            "max_position_ratio",
            "must be in (0, 1]",
        ));
    }
    Ok(())
}

fn validate_order_limits(params: &StrategyParameters) -> Result<(), ValidationError> {
    if !(params.min_order_amount >= 0.0) {
        return Err(ValidationError::new(
            "min_order_amount",
            "must be non-negative",
        ));
    }
    if !(params.lot_size > 0.0) {
        return Err(ValidationError::new("lot_size", "must be positive"));
    }
    Ok(())
}

fn validate_kelly(params: &StrategyParameters) -> Result<(), ValidationError> {
    if !(params.kelly_payoff_ratio > 0.0) {
        return Err(ValidationError::new(
            "kelly_payoff_ratio",
            "must be positive",
        ));
    }
    if !(0.0..=1.0).contains(&params.neutral_win_rate) {
        return Err(ValidationError::new(
            "neutral_win_rate",
            "must be between 0 and 1",
        ));
    }
    Ok(())
}

fn validate_window(params: &StrategyParameters) -> Result<(), ValidationError> {
    let required = params.required_history();
    if params.window_capacity < required {
        return Err(ValidationError::new(
            "window_capacity",
            format!(
                "capacity {} is below the {required} candles the indicators need",
                params.window_capacity
            ),
        ));
    }
    Ok(())
}

fn validate_symbols(params: &StrategyParameters) -> Result<(), ValidationError> {
    if params.target_symbols.is_empty() {
        return Err(ValidationError::new(
            "target_symbols",
            "at least one symbol is required",
        ));
    }
    let mut seen = HashSet::new();
    for symbol in &params.target_symbols {
        if symbol.trim().is_empty() {
            return Err(ValidationError::new("target_symbols", "blank symbol"));
        }
        if !seen.insert(symbol.as_str()) {
            return Err(ValidationError::new(
                "target_symbols",
                format!("duplicate symbol {symbol}"),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn params() -> StrategyParameters {
        StrategyParameters::default()
    }

    fn rejected_field(p: &StrategyParameters) -> String {
        validate_parameters(p).unwrap_err().field
    }

    #[test]
    fn valid_defaults() {
        assert!(validate_parameters(&params()).is_ok());
    }

    #[test]
    fn zero_period() {
        let p = StrategyParameters {
            atr_period: 0,
            ..params()
        };
        assert_eq!(rejected_field(&p), "atr_period");
    }

    #[test]
    fn fast_not_below_slow() {
        let p = StrategyParameters {
            ema_fast_period: 60,
            ema_slow_period: 60,
            ..params()
        };
        assert_eq!(rejected_field(&p), "ema_fast_period");
    }

    #[test]
    fn overbought_above_100() {
        let p = StrategyParameters {
            rsi_overbought: 101.0,
            ..params()
        };
        assert_eq!(rejected_field(&p), "rsi_overbought");
    }

    #[test]
    fn oversold_not_below_overbought() {
        let p = StrategyParameters {
            rsi_oversold: 70.0,
            ..params()
        };
        assert_eq!(rejected_field(&p), "rsi_oversold");
    }

    #[test]
    fn negative_multiplier() {
        let p = StrategyParameters {
            atr_stop_multiplier: -1.0,
            ..params()
        };
        assert_eq!(rejected_field(&p), "atr_stop_multiplier");
    }

    #[test]
    fn nan_reward_ratio() {
        let p = StrategyParameters {
            reward_risk_ratio: f64::NAN,
            ..params()
        };
        assert_eq!(rejected_field(&p), "reward_risk_ratio");
    }

    #[test]
    fn ratio_zero_and_above_one() {
        for ratio in [0.0, 1.5] {
            let p = StrategyParameters {
                max_position_ratio: ratio,
                ..params()
            };
            assert_eq!(rejected_field(&p), "max_position_ratio");
        }
    }

    #[test]
    fn ratio_of_one_allowed() {
        let p = StrategyParameters {
            max_position_ratio: 1.0,
            ..params()
        };
        assert!(validate_parameters(&p).is_ok());
    }

    #[test]
    fn negative_min_order() {
        let p = StrategyParameters {
            min_order_amount: -1.0,
            ..params()
        };
        assert_eq!(rejected_field(&p), "min_order_amount");
    }

    #[test]
    fn zero_lot_size() {
        let p = StrategyParameters {
            lot_size: 0.0,
            ..params()
        };
        assert_eq!(rejected_field(&p), "lot_size");
    }

    #[test]
    fn neutral_win_rate_out_of_range() {
        let p = StrategyParameters {
            neutral_win_rate: 1.2,
            ..params()
        };
        assert_eq!(rejected_field(&p), "neutral_win_rate");
    }

    #[test]
    fn window_smaller_than_history() {
        let p = StrategyParameters {
            window_capacity: 59,
            ..params()
        };
        assert_eq!(rejected_field(&p), "window_capacity");
    }

    #[test]
    fn empty_symbols() {
        let p = StrategyParameters {
            target_symbols: vec![],
            ..params()
        };
        assert_eq!(rejected_field(&p), "target_symbols");
    }

    #[test]
    fn duplicate_symbols() {
        let p = StrategyParameters {
            target_symbols: vec!["BTC_KRW".into(), "BTC_KRW".into()],
            ..params()
        };
        assert_eq!(rejected_field(&p), "target_symbols");
    }

    #[test]
    fn strategy_config_roundtrip() {
        let config = FileConfigAdapter::from_string(
            "[strategy]\nema_fast_period = 3\nema_slow_period = 8\nwindow_capacity = 50\n",
        )
        .unwrap();
        let p = validate_strategy_config(&config).unwrap();
        assert_eq!(p.ema_fast_period, 3);
    }

    #[test]
    fn strategy_config_invalid() {
        let config = FileConfigAdapter::from_string(
            "[strategy]\nema_fast_period = 60\nema_slow_period = 20\n",
        )
        .unwrap();
        let err = validate_strategy_config(&config).unwrap_err();
        assert!(matches!(err, TradecoreError::Validation(_)));
    }
}
