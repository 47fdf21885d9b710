//! Per-symbol evaluation pipeline.
//!
//! One [`StrategyEngine`] owns everything stateful for a symbol: the candle
//! window, the indicator state, the crossover state machine and the running
//! statistics. Parameters are shared through an `Arc<ParameterStore>` and read
//! once per tick.
//!
//! Every tick produces exactly one [`Signal`]. Failures along the way (an
//! out-of-order candle, short history, an unreachable account, a sizing
//! rejection) turn the decision into a HOLD and are listed in the
//! [`TickReport`] diagnostics.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use super::candle::{Candle, CandleWindow};
use super::error::{OutOfOrder, TradecoreError};
use super::indicator::{IndicatorEngine, IndicatorOutcome};
use super::parameters::{ParameterStore, StrategyParameters};
use super::performance::{Outcome, PerformanceStats, PerformanceTracker};
use super::risk::{AssessmentRequest, RiskManager};
use super::signal::{PositionState, Signal, SignalBuilder, SignalGenerator, SignalType};
use crate::ports::account_port::AccountPort;
use crate::ports::candle_port::CandleSource;
use crate::ports::signal_port::SignalSink;

#[derive(Debug, Clone)]
pub struct TickReport {
    pub signal: Signal,
    /// The window saw an out-of-order candle and has not been rebuilt since.
    pub rebuild_required: bool,
    pub persist_error: Option<String>,
    /// The candle source failed; no candle was evaluated.
    pub source_failed: bool,
    pub diagnostics: Vec<String>,
}

impl TickReport {
    pub fn persisted(&self) -> bool {
        self.persist_error.is_none()
    }
}

pub struct StrategyEngine {
    symbol: String,
    params: Arc<ParameterStore>,
    window: CandleWindow,
    indicators: IndicatorEngine,
    generator: SignalGenerator,
    risk: RiskManager,
    performance: PerformanceTracker,
    rebuild_required: bool,
}

impl StrategyEngine {
    /// The window capacity is taken from the parameters at construction.
    pub fn new(symbol: impl Into<String>, params: Arc<ParameterStore>) -> Self {
        let symbol = symbol.into();
        let snapshot = params.snapshot();
        StrategyEngine {
            window: CandleWindow::new(symbol.clone(), snapshot.window_capacity),
            performance: PerformanceTracker::new(snapshot.neutral_win_rate),
            symbol,
            params,
            indicators: IndicatorEngine::new(),
            generator: SignalGenerator::new(),
            risk: RiskManager::new(),
            rebuild_required: false,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn window(&self) -> &CandleWindow {
        &self.window
    }

    pub fn state(&self) -> PositionState {
        self.generator.state()
    }

    pub fn stats(&self) -> &PerformanceStats {
        self.performance.stats()
    }

    pub fn win_rate(&self) -> f64 {
        self.performance.win_rate()
    }

    pub fn rebuild_required(&self) -> bool {
        self.rebuild_required
    }

    pub fn full_recomputes(&self) -> u64 {
        self.indicators.full_recomputes()
    }

    /// Set the position state, e.g. when a long is already open at startup.
    pub fn restore_state(&mut self, state: PositionState) {
        self.generator.restore(state);
    }

    /// Outcome of an earlier signal, reported by the execution side.
    pub fn record_outcome(&mut self, outcome: Outcome) {
        self.performance.settle(outcome);
    }

    /// Replace the window from a fresh, ordered history. Clears the
    /// rebuild flag on success.
    pub fn rebuild(&mut self, history: Vec<Candle>) -> Result<(), OutOfOrder> {
        let count = history.len();
        self.window.rebuild(history)?;
        self.rebuild_required = false;
        info!(
            symbol = %self.symbol,
            candles = count,
            generation = self.window.generation(),
            "candle window rebuilt"
        );
        Ok(())
    }

    /// Pull the next candle from `source` and evaluate it. `None` when the
    /// source has nothing new.
    pub fn tick(
        &mut self,
        source: &dyn CandleSource,
        account: &dyn AccountPort,
        sink: &dyn SignalSink,
    ) -> Option<TickReport> {
        match source.latest(&self.symbol) {
            Ok(Some(candle)) => Some(self.on_candle(candle, account, sink)),
            Ok(None) => None,
            Err(e) => {
                warn!(symbol = %self.symbol, error = %e, "candle source failed");
                let price = self.window.last().map_or(0.0, |c| c.close);
                let signal = self
                    .signal(SignalType::Hold, price, Utc::now())
                    .reason(e.to_string())
                    .build();
                let mut report = self.emit(signal, sink, vec![e.to_string()]);
                report.source_failed = true;
                Some(report)
            }
        }
    }

    pub fn on_candle(
        &mut self,
        candle: Candle,
        account: &dyn AccountPort,
        sink: &dyn SignalSink,
    ) -> TickReport {
        let params = self.params.snapshot();
        self.performance.set_neutral_win_rate(params.neutral_win_rate);

        let mut diagnostics = Vec::new();
        let signal = self.decide(candle, &params, account, &mut diagnostics);
        self.emit(signal, sink, diagnostics)
    }

    fn decide(
        &mut self,
        candle: Candle,
        params: &StrategyParameters,
        account: &dyn AccountPort,
        diagnostics: &mut Vec<String>,
    ) -> Signal {
        let price = candle.close;
        let at = candle.timestamp;

        if candle.symbol != self.symbol {
            let msg = format!("candle for {} delivered to the {} engine", candle.symbol, self.symbol);
            warn!(symbol = %self.symbol, received = %candle.symbol, "misrouted candle");
            diagnostics.push(msg.clone());
            return self.signal(SignalType::Hold, price, at).reason(msg).build();
        }

        if !candle.is_well_formed() {
            let msg = format!("malformed candle at {} skipped", candle.timestamp);
            warn!(symbol = %self.symbol, timestamp = %candle.timestamp, "malformed candle");
            diagnostics.push(msg.clone());
            let price = self.window.last().map_or(0.0, |c| c.close);
            return self.signal(SignalType::Hold, price, at).reason(msg).build();
        }

        if let Err(e) = self.window.append(candle) {
            self.rebuild_required = true;
            warn!(
                symbol = %self.symbol,
                last = %e.last,
                received = %e.received,
                "out-of-order candle, window rebuild required"
            );
            diagnostics.push(e.to_string());
            return self.signal(SignalType::Hold, price, at).reason(e.to_string()).build();
        }

        let snapshot = match self.indicators.compute(&self.window, params) {
            IndicatorOutcome::Ready(snapshot) => snapshot,
            IndicatorOutcome::Insufficient { have, need } => {
                debug!(symbol = %self.symbol, have, need, "insufficient history");
                return self
                    .signal(SignalType::Hold, price, at)
                    .reason(format!("insufficient history: {have} of {need} candles"))
                    .build();
            }
        };

        let prior_state = self.generator.state();
        let decision = self.generator.on_snapshot(&snapshot, params);
        let atr = snapshot.atr;

        if !decision.signal_type.is_actionable() {
            return self
                .signal(SignalType::Hold, price, at)
                .indicators(snapshot)
                .reasons(decision.reasons)
                .build();
        }

        let rejection = match self.account_request(decision.signal_type, price, atr, account) {
            Ok(request) => match self.risk.assess(&request, params, self.performance.stats()) {
                Ok(assessment) => {
                    info!(
                        symbol = %self.symbol,
                        signal = %decision.signal_type,
                        price,
                        size = assessment.position_size,
                        stop = assessment.stop_price,
                        take_profit = assessment.take_profit_price,
                        strength = decision.strength,
                        "signal emitted"
                    );
                    return self
                        .signal(decision.signal_type, price, at)
                        .strength(decision.strength)
                        .indicators(snapshot)
                        .risk(&assessment)
                        .reasons(decision.reasons)
                        .build();
                }
                Err(rejection) => {
                    info!(
                        symbol = %self.symbol,
                        signal = %decision.signal_type,
                        reason = %rejection,
                        "signal downgraded to HOLD"
                    );
                    rejection.to_string()
                }
            },
            Err(e) => {
                warn!(symbol = %self.symbol, error = %e, "account lookup failed");
                diagnostics.push(e.to_string());
                e.to_string()
            }
        };

        // No position was opened or closed, so the state machine stays put.
        self.generator.restore(prior_state);
        self.signal(SignalType::Hold, price, at)
            .original_signal_type(decision.signal_type)
            .indicators(snapshot)
            .reasons(decision.reasons)
            .reason(rejection)
            .build()
    }

    fn account_request(
        &self,
        signal_type: SignalType,
        price: f64,
        atr: f64,
        account: &dyn AccountPort,
    ) -> Result<AssessmentRequest, TradecoreError> {
        let equity = account.equity()?;
        let current_position = match signal_type {
            SignalType::Sell => account.position(&self.symbol)?,
            _ => 0.0,
        };
        Ok(AssessmentRequest {
            signal_type,
            price,
            atr,
            equity,
            current_position,
        })
    }

    fn signal(&self, signal_type: SignalType, price: f64, at: DateTime<Utc>) -> SignalBuilder {
        Signal::builder(self.symbol.clone(), signal_type, price, at)
    }

    fn emit(&mut self, signal: Signal, sink: &dyn SignalSink, diagnostics: Vec<String>) -> TickReport {
        let persist_error = match sink.persist(&signal) {
            Ok(()) => None,
            Err(e) => {
                error!(symbol = %self.symbol, error = %e, "signal persistence failed");
                Some(e.to_string())
            }
        };
        self.performance.record(&signal, Outcome::Pending);

        TickReport {
            signal,
            rebuild_required: self.rebuild_required,
            persist_error,
            source_failed: false,
            diagnostics,
        }
    }
}

/// Totals for one symbol after [`run_symbols`] drained its source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub symbol: String,
    pub ticks: u64,
    pub persist_failures: u64,
    pub rebuilds: u64,
    /// The run stopped early: the source failed or the worker panicked.
    pub aborted: bool,
}

/// Drive each engine on its own scoped thread until its source runs dry.
///
/// Symbols are independent; each pipeline stays sequential. When a tick
/// reports an out-of-order candle the engine is rebuilt from
/// `source.history`.
pub fn run_symbols(
    engines: &mut [StrategyEngine],
    source: &(dyn CandleSource + Sync),
    account: &(dyn AccountPort + Sync),
    sink: &(dyn SignalSink + Sync),
) -> Vec<RunSummary> {
    std::thread::scope(|scope| {
        let handles: Vec<_> = engines
            .iter_mut()
            .map(|engine| {
                let symbol = engine.symbol().to_string();
                let handle = scope.spawn(move || drive(engine, source, account, sink));
                (symbol, handle)
            })
            .collect();

        handles
            .into_iter()
            .map(|(symbol, handle)| {
                handle.join().unwrap_or_else(|_| {
                    error!(symbol = %symbol, "symbol worker panicked");
                    RunSummary {
                        symbol,
                        aborted: true,
                        ..RunSummary::default()
                    }
                })
            })
            .collect()
    })
}

fn drive(
    engine: &mut StrategyEngine,
    source: &dyn CandleSource,
    account: &dyn AccountPort,
    sink: &dyn SignalSink,
) -> RunSummary {
    let mut summary = RunSummary {
        symbol: engine.symbol().to_string(),
        ..RunSummary::default()
    };

    while let Some(report) = engine.tick(source, account, sink) {
        summary.ticks += 1;
        if !report.persisted() {
            summary.persist_failures += 1;
        }
        if report.source_failed {
            summary.aborted = true;
            break;
        }
        if report.rebuild_required {
            let capacity = engine.window().capacity();
            let rebuilt = source
                .history(engine.symbol(), capacity)
                .and_then(|history| engine.rebuild(history).map_err(TradecoreError::from));
            match rebuilt {
                Ok(()) => summary.rebuilds += 1,
                Err(e) => warn!(symbol = %summary.symbol, error = %e, "window rebuild failed"),
            }
        }
    }

    info!(
        symbol = %summary.symbol,
        ticks = summary.ticks,
        rebuilds = summary.rebuilds,
        persist_failures = summary.persist_failures,
        "symbol run finished"
    );
    summary
}
