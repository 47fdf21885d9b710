//! CLI integration tests: `validate`, `run` and `signals` against INI and
//! CSV files on disk.

mod common;

use common::*;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tradecore::adapters::file_config_adapter::FileConfigAdapter;
use tradecore::adapters::fixed_account_adapter::FixedAccount;
use tradecore::cli::{self, Cli, Command};
use tradecore::domain::engine::StrategyEngine;
use tradecore::domain::signal::PositionState;

fn write_temp(content: &str, suffix: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn same_code(actual: ExitCode, expected: u8) -> bool {
    format!("{actual:?}") == format!("{:?}", ExitCode::from(expected))
}

fn validate(path: &Path) -> ExitCode {
    cli::run(Cli {
        command: Command::Validate {
            config: path.to_path_buf(),
        },
    })
}

fn run(config: &Path, candles: &Path, db: Option<PathBuf>) -> ExitCode {
    cli::run(Cli {
        command: Command::Run {
            config: config.to_path_buf(),
            candles: candles.to_path_buf(),
            db,
        },
    })
}

const VALID_INI: &str = r#"
[logging]
format = text

[strategy]
ema_fast_period = 3
ema_slow_period = 8
rsi_period = 14
atr_period = 14
window_capacity = 50
target_symbols = BTC_KRW

[account]
equity = 1000000
positions = BTC_KRW:100
"#;

fn ramp_csv(symbol: &str) -> String {
    let mut csv = String::from("symbol,timestamp,open,high,low,close,volume\n");
    for candle in make_candles(symbol, &ramp_closes()) {
        csv.push_str(&format!(
            "{},{},{},{},{},{},{}\n",
            candle.symbol,
            candle.timestamp.format("%Y-%m-%d %H:%M:%S"),
            candle.open,
            candle.high,
            candle.low,
            candle.close,
            candle.volume,
        ));
    }
    csv
}

mod validate_command {
    use super::*;

    #[test]
    fn valid_config_succeeds() {
        let file = write_temp(VALID_INI, ".ini");
        assert!(same_code(validate(file.path()), 0));
    }

    #[test]
    fn missing_file_is_config_error() {
        let code = validate(Path::new("/nonexistent/path/config.ini"));
        assert!(same_code(code, 2));
    }

    #[test]
    fn fast_not_below_slow_is_rejected() {
        let file = write_temp(
            "[strategy]\nema_fast_period = 60\nema_slow_period = 20\n",
            ".ini",
        );
        assert!(same_code(validate(file.path()), 2));
    }

    #[test]
    fn duplicate_symbols_are_rejected() {
        let file = write_temp("[strategy]\ntarget_symbols = BTC_KRW, btc_krw\n", ".ini");
        assert!(same_code(validate(file.path()), 2));
    }

    #[test]
    fn malformed_number_is_rejected() {
        let file = write_temp("[strategy]\nrsi_period = abc\n", ".ini");
        assert!(same_code(validate(file.path()), 2));
    }

    #[test]
    fn empty_config_uses_defaults() {
        let file = write_temp("[strategy]\n", ".ini");
        assert!(same_code(validate(file.path()), 0));
    }
}

mod run_command {
    use super::*;

    #[test]
    fn replay_without_db_succeeds() {
        let config = write_temp(VALID_INI, ".ini");
        let candles = write_temp(&ramp_csv("BTC_KRW"), ".csv");

        assert!(same_code(run(config.path(), candles.path(), None), 0));
    }

    #[test]
    fn missing_equity_is_config_error() {
        let config = write_temp("[strategy]\nema_fast_period = 3\nema_slow_period = 8\n", ".ini");
        let candles = write_temp(&ramp_csv("BTC_KRW"), ".csv");

        assert!(same_code(run(config.path(), candles.path(), None), 2));
    }

    #[test]
    fn malformed_csv_is_candle_error() {
        let config = write_temp(VALID_INI, ".ini");
        let candles = write_temp(
            "symbol,timestamp,open,high,low,close,volume\nBTC_KRW,yesterday,1,1,1,1,1\n",
            ".csv",
        );

        assert!(same_code(run(config.path(), candles.path(), None), 4));
    }

    #[test]
    fn symbol_missing_from_csv_aborts() {
        let ini = VALID_INI.replace("target_symbols = BTC_KRW", "target_symbols = BTC_KRW, ETH_KRW");
        let config = write_temp(&ini, ".ini");
        let candles = write_temp(&ramp_csv("BTC_KRW"), ".csv");

        assert!(same_code(run(config.path(), candles.path(), None), 4));
    }

    #[test]
    fn held_symbols_start_long() {
        let store = scenario_store();
        let mut engines = vec![
            StrategyEngine::new("BTC_KRW", Arc::clone(&store)),
            StrategyEngine::new("ETH_KRW", Arc::clone(&store)),
        ];
        let account = FixedAccount::new(1_000_000.0).with_position("BTC_KRW", 2.5);

        cli::restore_open_positions(&mut engines, &account).unwrap();

        assert_eq!(engines[0].state(), PositionState::Long);
        assert_eq!(engines[1].state(), PositionState::Neutral);
    }

    #[test]
    fn counting_sink_without_sqlite_path() {
        let adapter = FileConfigAdapter::from_string(VALID_INI).unwrap();
        assert!(cli::build_sink(None, &adapter).is_ok());
    }
}

#[cfg(feature = "sqlite")]
mod sqlite_round_trip {
    use super::*;
    use tradecore::adapters::sqlite_adapter::SqliteSignalStore;
    use tradecore::domain::signal::SignalType;

    #[test]
    fn run_persists_every_tick_then_lists() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("signals.db");
        let ini = VALID_INI.replace("positions = BTC_KRW:100", "");
        let config = write_temp(&ini, ".ini");
        let candles = write_temp(&ramp_csv("BTC_KRW"), ".csv");

        assert!(same_code(run(config.path(), candles.path(), Some(db.clone())), 0));

        let store = SqliteSignalStore::open(&db.display().to_string(), 1).unwrap();
        let signals = store.list_signals("BTC_KRW").unwrap();
        let types: Vec<SignalType> = signals.iter().map(|s| s.signal_type()).collect();

        assert_eq!(signals.len(), 30);
        assert_eq!(types[14], SignalType::Buy);
        // nothing is held in the static account, so the exit cannot be sized
        assert_eq!(types[22], SignalType::Hold);
        assert_eq!(signals[22].original_signal_type(), SignalType::Sell);
        assert_eq!(types.iter().filter(|t| **t != SignalType::Hold).count(), 1);
        assert!(signals[0].indicators().is_none());
        assert!(signals[14].indicators().is_some());

        let listed = cli::run(Cli {
            command: Command::Signals {
                db: db.clone(),
                symbol: "btc_krw".into(),
            },
        });
        assert!(same_code(listed, 0));
    }

    #[test]
    fn held_position_starts_long() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("held.db");
        let config = write_temp(VALID_INI, ".ini");
        let candles = write_temp(&ramp_csv("BTC_KRW"), ".csv");

        assert!(same_code(run(config.path(), candles.path(), Some(db.clone())), 0));

        let store = SqliteSignalStore::open(&db.display().to_string(), 1).unwrap();
        let signals = store.list_signals("BTC_KRW").unwrap();
        let types: Vec<SignalType> = signals.iter().map(|s| s.signal_type()).collect();

        // already long at the golden cross, so the first actionable signal
        // is the exit of the held quantity
        assert_eq!(types[14], SignalType::Hold);
        assert_eq!(types[22], SignalType::Sell);
        assert_eq!(signals[22].position_size(), 100.0);
        assert_eq!(types.iter().filter(|t| **t != SignalType::Hold).count(), 1);
    }

    #[test]
    fn sqlite_path_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("from_config.db");
        let ini = format!("{VALID_INI}\n[sqlite]\npath = {}\npool_size = 2\n", db.display());
        let config = write_temp(&ini, ".ini");
        let candles = write_temp(&ramp_csv("BTC_KRW"), ".csv");

        assert!(same_code(run(config.path(), candles.path(), None), 0));

        let store = SqliteSignalStore::open(&db.display().to_string(), 1).unwrap();
        assert_eq!(store.list_signals("BTC_KRW").unwrap().len(), 30);
    }
}
