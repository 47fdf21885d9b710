//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use crate::adapters::csv_adapter::CsvCandleSource;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::fixed_account_adapter::FixedAccount;
use crate::adapters::counting_sink::CountingSignalSink;
use crate::domain::config_validation::validate_strategy_config;
use crate::domain::engine::{run_symbols, RunSummary, StrategyEngine};
use crate::domain::error::TradecoreError;
use crate::domain::parameters::{ParameterStore, StrategyParameters};
use crate::domain::signal::PositionState;
use crate::logging::{init_logging, LogFormat};
use crate::ports::account_port::AccountPort;
use crate::ports::config_port::ConfigPort;
use crate::ports::signal_port::SignalSink;

#[derive(Parser, Debug)]
#[command(name = "tradecore", about = "EMA/RSI/ATR signal engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay a candle CSV through one engine per target symbol
    Run {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        candles: PathBuf,
        /// SQLite file for emitted signals (overrides [sqlite] path)
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Validate the [strategy] section of a config file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List persisted signals for a symbol
    Signals {
        #[arg(long)]
        db: PathBuf,
        #[arg(long)]
        symbol: String,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Run {
            config,
            candles,
            db,
        } => run_engine(&config, &candles, db.as_deref()),
        Command::Validate { config } => run_validate(&config),
        Command::Signals { db, symbol } => run_signals(&db, &symbol),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|err| {
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn fail(err: TradecoreError) -> ExitCode {
    tracing::error!(error = %err, "command failed");
    eprintln!("error: {err}");
    (&err).into()
}

fn run_engine(config_path: &Path, candles_path: &Path, db: Option<&Path>) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    init_logging(LogFormat::from_config(&adapter));

    let params = match validate_strategy_config(&adapter) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };
    let account = match FixedAccount::from_config(&adapter) {
        Ok(a) => a,
        Err(e) => return fail(e),
    };
    let source = match CsvCandleSource::from_path(candles_path) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    let sink = match build_sink(db, &adapter) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    let symbols = params.target_symbols.clone();
    let store = match ParameterStore::new(params) {
        Ok(s) => Arc::new(s),
        Err(e) => return fail(e.into()),
    };

    tracing::info!(
        symbols = ?symbols,
        candles = %candles_path.display(),
        "starting replay"
    );

    let mut engines: Vec<StrategyEngine> = symbols
        .iter()
        .map(|symbol| StrategyEngine::new(symbol.clone(), Arc::clone(&store)))
        .collect();
    if let Err(e) = restore_open_positions(&mut engines, &account) {
        return fail(e);
    }
    let summaries = run_symbols(&mut engines, &source, &account, sink.as_ref());

    print_summary(&engines, &summaries);

    if summaries.iter().any(|s| s.aborted) {
        ExitCode::from(4)
    } else {
        ExitCode::SUCCESS
    }
}

/// Engines whose symbol already has a held quantity start out Long, so the
/// replay can close that position.
pub fn restore_open_positions(
    engines: &mut [StrategyEngine],
    account: &dyn AccountPort,
) -> Result<(), TradecoreError> {
    for engine in engines.iter_mut() {
        let held = account.position(engine.symbol())?;
        if held > 0.0 {
            tracing::info!(symbol = engine.symbol(), held, "starting with an open long");
            engine.restore_state(PositionState::Long);
        }
    }
    Ok(())
}

/// SQLite when a path is given on the command line or in `[sqlite] path`,
/// otherwise a sink that only counts.
pub fn build_sink(
    db: Option<&Path>,
    config: &dyn ConfigPort,
) -> Result<Box<dyn SignalSink + Sync>, TradecoreError> {
    let path = db
        .map(|p| p.display().to_string())
        .or_else(|| config.get_string("sqlite", "path"));

    match path {
        Some(path) => open_sqlite(&path, config),
        None => Ok(Box::new(CountingSignalSink::new())),
    }
}

#[cfg(feature = "sqlite")]
fn open_sqlite(
    path: &str,
    config: &dyn ConfigPort,
) -> Result<Box<dyn SignalSink + Sync>, TradecoreError> {
    use crate::adapters::sqlite_adapter::SqliteSignalStore;

    let pool_size = config.get_int("sqlite", "pool_size")?.unwrap_or(4).clamp(1, 64) as u32;
    let store = SqliteSignalStore::open(path, pool_size)?;
    store.initialize_schema()?;
    Ok(Box::new(store))
}

#[cfg(not(feature = "sqlite"))]
fn open_sqlite(
    _path: &str,
    _config: &dyn ConfigPort,
) -> Result<Box<dyn SignalSink + Sync>, TradecoreError> {
    Err(TradecoreError::ConfigInvalid {
        section: "sqlite".into(),
        key: "path".into(),
        reason: "built without the sqlite feature".into(),
    })
}

fn print_summary(engines: &[StrategyEngine], summaries: &[RunSummary]) {
    println!(
        "{:<12} {:>6} {:>5} {:>5} {:>6} {:>9} {:>8} {:>9}  STATE",
        "SYMBOL", "TICKS", "BUY", "SELL", "HOLD", "STRENGTH", "REBUILDS", "PERSIST!"
    );
    for (engine, summary) in engines.iter().zip(summaries) {
        let stats = engine.stats();
        println!(
            "{:<12} {:>6} {:>5} {:>5} {:>6} {:>9.3} {:>8} {:>9}  {:?}{}",
            summary.symbol,
            summary.ticks,
            stats.buy_count,
            stats.sell_count,
            stats.hold_count,
            stats.average_strength(),
            summary.rebuilds,
            summary.persist_failures,
            engine.state(),
            if summary.aborted { " (aborted)" } else { "" },
        );
    }
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    match validate_strategy_config(&adapter) {
        Ok(params) => {
            print_parameters(&params);
            eprintln!("Config is valid.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn print_parameters(params: &StrategyParameters) {
    eprintln!(
        "  EMA {}/{}  RSI {} ({}/{})  ATR {} x{}  R:R {}",
        params.ema_fast_period,
        params.ema_slow_period,
        params.rsi_period,
        params.rsi_oversold,
        params.rsi_overbought,
        params.atr_period,
        params.atr_stop_multiplier,
        params.reward_risk_ratio,
    );
    eprintln!(
        "  max position {:.0}%  min order {}  lot {}",
        params.max_position_ratio * 100.0,
        params.min_order_amount,
        params.lot_size,
    );
    eprintln!(
        "  window {} (needs {})  symbols: {}",
        params.window_capacity,
        params.required_history(),
        params.target_symbols.join(", "),
    );
}

#[cfg(feature = "sqlite")]
fn run_signals(db: &Path, symbol: &str) -> ExitCode {
    use crate::adapters::sqlite_adapter::SqliteSignalStore;

    let store = match SqliteSignalStore::open(&db.display().to_string(), 1) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    let signals = match store.list_signals(&symbol.to_uppercase()) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    for signal in &signals {
        println!(
            "{}  {:<4} {:>14.2}  size {:.4}  stop {:.2}  tp {:.2}  strength {:.3}  {}",
            signal.created_at().to_rfc3339(),
            signal.signal_type(),
            signal.price(),
            signal.position_size(),
            signal.stop_price(),
            signal.take_profit_price(),
            signal.strength(),
            signal.reasons().join("; "),
        );
    }
    eprintln!("{} signal(s)", signals.len());
    ExitCode::SUCCESS
}

#[cfg(not(feature = "sqlite"))]
fn run_signals(_db: &Path, _symbol: &str) -> ExitCode {
    eprintln!("error: sqlite feature is required for signals");
    ExitCode::from(1)
}
