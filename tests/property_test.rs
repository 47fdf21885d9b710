mod common;

use approx::relative_eq;
use common::*;
use proptest::prelude::*;
use std::sync::Arc;
use tradecore::domain::candle::{Candle, CandleWindow};
use tradecore::domain::engine::StrategyEngine;
use tradecore::domain::indicator::atr::Atr;
use tradecore::domain::indicator::rsi::Rsi;
use tradecore::domain::indicator::{compute_full, IndicatorEngine};
use tradecore::domain::parameters::{ParameterStore, StrategyParameters};
use tradecore::domain::performance::PerformanceStats;
use tradecore::domain::risk::{AssessmentRequest, RiskManager};
use tradecore::domain::signal::SignalType;

fn candles_from(bars: &[(f64, f64, f64, f64)]) -> Vec<Candle> {
    bars.iter()
        .enumerate()
        .map(|(i, &(close, up, down, volume))| {
            let mut candle = make_candle("BTC_KRW", i as i64, close);
            candle.high = close + up;
            candle.low = (close - down).max(0.01);
            candle.volume = volume;
            candle
        })
        .collect()
}

fn bar() -> impl Strategy<Value = (f64, f64, f64, f64)> {
    (1.0f64..1000.0, 0.0f64..20.0, 0.0f64..20.0, 0.1f64..500.0)
}

proptest! {
    #[test]
    fn rsi_stays_in_range(closes in prop::collection::vec(1.0f64..1000.0, 1..120), period in 1usize..30) {
        let mut rsi = Rsi::new(period);
        for close in closes {
            if let Some(value) = rsi.next(close) {
                prop_assert!((0.0..=100.0).contains(&value), "rsi {value}");
            }
        }
    }

    #[test]
    fn atr_is_never_negative(bars in prop::collection::vec(bar(), 1..120), period in 1usize..30) {
        let mut atr = Atr::new(period);
        for candle in candles_from(&bars) {
            if let Some(value) = atr.next(&candle) {
                prop_assert!(value >= 0.0, "atr {value}");
            }
        }
    }

    #[test]
    fn buy_notional_within_cap(
        price in 0.01f64..1_000_000.0,
        atr in 0.0f64..10_000.0,
        equity in 1.0f64..1e9,
        ratio in 0.01f64..=1.0,
    ) {
        let params = StrategyParameters {
            max_position_ratio: ratio,
            min_order_amount: 0.0,
            ..StrategyParameters::default()
        };
        let request = AssessmentRequest {
            signal_type: SignalType::Buy,
            price,
            atr,
            equity,
            current_position: 0.0,
        };

        if let Ok(assessment) = RiskManager::new().assess(&request, &params, &PerformanceStats::default()) {
            prop_assert!(assessment.notional(price) <= equity * ratio);
            prop_assert!(assessment.position_size > 0.0);
            prop_assert!(assessment.stop_price <= price);
            prop_assert!(assessment.take_profit_price >= price);
        }
    }

    #[test]
    fn buys_and_sells_alternate(bars in prop::collection::vec(bar(), 1..150)) {
        let params = StrategyParameters {
            min_order_amount: 0.0,
            ..scenario_params()
        };
        let store = Arc::new(ParameterStore::new(params).unwrap());
        let mut engine = StrategyEngine::new("BTC_KRW", store);
        let account = MockAccount::new(1e9).with_position("BTC_KRW", 1000.0);
        let sink = RecordingSink::new();

        for candle in candles_from(&bars) {
            engine.on_candle(candle, &account, &sink);
        }

        let actionable: Vec<SignalType> = sink
            .types()
            .into_iter()
            .filter(|t| t.is_actionable())
            .collect();
        for (i, t) in actionable.iter().enumerate() {
            let expected = if i % 2 == 0 { SignalType::Buy } else { SignalType::Sell };
            prop_assert_eq!(*t, expected);
        }
    }

    #[test]
    fn incremental_matches_full_recompute(
        bars in prop::collection::vec(bar(), 1..150),
        capacity in 15usize..200,
    ) {
        let params = StrategyParameters {
            window_capacity: capacity,
            ..scenario_params()
        };
        let mut window = CandleWindow::new("BTC_KRW", params.window_capacity);
        let mut engine = IndicatorEngine::new();

        for candle in candles_from(&bars) {
            window.append(candle).unwrap();
            let incremental = engine.compute(&window, &params);
            let full = compute_full(&window, &params);

            match (incremental.ready(), full.ready()) {
                (Some(a), Some(b)) => {
                    prop_assert!(relative_eq!(a.ema_fast, b.ema_fast, max_relative = 1e-9));
                    prop_assert!(relative_eq!(a.ema_slow, b.ema_slow, max_relative = 1e-9));
                    prop_assert!(relative_eq!(a.rsi, b.rsi, epsilon = 1e-9, max_relative = 1e-9));
                    prop_assert!(relative_eq!(a.atr, b.atr, epsilon = 1e-9, max_relative = 1e-9));
                    prop_assert!(relative_eq!(a.avg_volume, b.avg_volume, max_relative = 1e-9));
                }
                (None, None) => {}
                (a, b) => prop_assert!(false, "readiness differs: {a:?} vs {b:?}"),
            }
        }
        let evictions = bars.len().saturating_sub(capacity) as u64;
        prop_assert_eq!(engine.full_recomputes(), 1 + evictions);
    }
}
