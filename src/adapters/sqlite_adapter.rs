//! SQLite signal store.
//!
//! One row per emitted signal in `strategy_signals`, indexed by
//! `(symbol, created_at)`. Indicator columns are NULL for signals emitted
//! before the indicators were ready.

use crate::domain::error::TradecoreError;
use crate::domain::indicator::IndicatorSnapshot;
use crate::domain::risk::RiskAssessment;
use crate::domain::signal::{Signal, SignalType};
use crate::ports::config_port::ConfigPort;
use crate::ports::signal_port::SignalSink;
use chrono::{DateTime, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

const REASON_SEPARATOR: &str = "\n";

pub struct SqliteSignalStore {
    pool: Pool<SqliteConnectionManager>,
}

fn pool_error(e: r2d2::Error) -> TradecoreError {
    TradecoreError::Database {
        reason: e.to_string(),
    }
}

fn query_error(e: rusqlite::Error) -> TradecoreError {
    TradecoreError::DatabaseQuery {
        reason: e.to_string(),
    }
}

impl SqliteSignalStore {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, TradecoreError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| TradecoreError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;
        let pool_size = config.get_int("sqlite", "pool_size")?.unwrap_or(4).clamp(1, 64) as u32;
        Self::open(&db_path, pool_size)
    }

    pub fn open(path: &str, pool_size: u32) -> Result<Self, TradecoreError> {
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder()
            .max_size(pool_size.max(1))
            .build(manager)
            .map_err(pool_error)?;
        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, TradecoreError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(pool_error)?;
        Ok(Self { pool })
    }

    pub fn initialize_schema(&self) -> Result<(), TradecoreError> {
        let conn = self.pool.get().map_err(pool_error)?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS strategy_signals (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                signal_type TEXT NOT NULL,
                original_signal_type TEXT NOT NULL,
                strength REAL NOT NULL,
                price REAL NOT NULL,
                ema_fast REAL,
                ema_slow REAL,
                rsi REAL,
                atr REAL,
                avg_volume REAL,
                volume REAL,
                volume_ratio REAL NOT NULL,
                position_size REAL NOT NULL,
                risk_amount REAL NOT NULL,
                stop_price REAL NOT NULL,
                take_profit_price REAL NOT NULL,
                reasons TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_strategy_signals_symbol_created
                ON strategy_signals(symbol, created_at);",
        )
        .map_err(query_error)?;

        Ok(())
    }

    /// Signals for `symbol`, oldest first.
    pub fn list_signals(&self, symbol: &str) -> Result<Vec<Signal>, TradecoreError> {
        let conn = self.pool.get().map_err(pool_error)?;

        let query = "SELECT symbol, signal_type, original_signal_type, strength, price,
                            ema_fast, ema_slow, rsi, atr, avg_volume, volume,
                            position_size, risk_amount, stop_price, take_profit_price,
                            reasons, created_at
                     FROM strategy_signals
                     WHERE symbol = ?1
                     ORDER BY created_at ASC, id ASC";

        let mut stmt = conn.prepare(query).map_err(query_error)?;
        let rows = stmt
            .query_map(params![symbol], |row| {
                let created_raw: String = row.get(16)?;
                let created_at = DateTime::parse_from_rfc3339(&created_raw)
                    .map(|ts| ts.with_timezone(&Utc))
                    .map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            16,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })?;
                let signal_type = parse_signal_type(row.get(1)?, 1)?;
                let original = parse_signal_type(row.get(2)?, 2)?;

                let ema_fast: Option<f64> = row.get(5)?;
                let indicators = match ema_fast {
                    Some(ema_fast) => Some(IndicatorSnapshot {
                        ema_fast,
                        ema_slow: row.get::<_, Option<f64>>(6)?.unwrap_or_default(),
                        rsi: row.get::<_, Option<f64>>(7)?.unwrap_or_default(),
                        atr: row.get::<_, Option<f64>>(8)?.unwrap_or_default(),
                        avg_volume: row.get::<_, Option<f64>>(9)?.unwrap_or_default(),
                        volume: row.get::<_, Option<f64>>(10)?.unwrap_or_default(),
                        timestamp: created_at,
                    }),
                    None => None,
                };
                let assessment = RiskAssessment {
                    position_size: row.get(11)?,
                    risk_amount: row.get(12)?,
                    stop_price: row.get(13)?,
                    take_profit_price: row.get(14)?,
                };
                let reasons: String = row.get(15)?;

                let symbol: String = row.get(0)?;
                let mut builder = Signal::builder(symbol, signal_type, row.get(4)?, created_at)
                    .strength(row.get(3)?)
                    .risk(&assessment)
                    .original_signal_type(original)
                    .reasons(reasons.split(REASON_SEPARATOR).filter(|r| !r.is_empty()));
                if let Some(snapshot) = indicators {
                    builder = builder.indicators(snapshot);
                }
                Ok(builder.build())
            })
            .map_err(query_error)?;

        let mut signals = Vec::new();
        for row in rows {
            signals.push(row.map_err(query_error)?);
        }
        Ok(signals)
    }
}

fn parse_signal_type(raw: String, column: usize) -> rusqlite::Result<SignalType> {
    raw.parse::<SignalType>().map_err(|reason| {
        rusqlite::Error::FromSqlConversionFailure(
            column,
            rusqlite::types::Type::Text,
            reason.into(),
        )
    })
}

impl SignalSink for SqliteSignalStore {
    fn persist(&self, signal: &Signal) -> Result<(), TradecoreError> {
        let conn = self.pool.get().map_err(|e| TradecoreError::Persistence {
            reason: e.to_string(),
        })?;

        let snapshot = signal.indicators();
        let reasons = signal.reasons().join(REASON_SEPARATOR);

        conn.execute(
            "INSERT INTO strategy_signals (
                symbol, signal_type, original_signal_type, strength, price,
                ema_fast, ema_slow, rsi, atr, avg_volume, volume, volume_ratio,
                position_size, risk_amount, stop_price, take_profit_price,
                reasons, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            params![
                signal.symbol(),
                signal.signal_type().as_str(),
                signal.original_signal_type().as_str(),
                signal.strength(),
                signal.price(),
                snapshot.map(|s| s.ema_fast),
                snapshot.map(|s| s.ema_slow),
                snapshot.map(|s| s.rsi),
                snapshot.map(|s| s.atr),
                snapshot.map(|s| s.avg_volume),
                snapshot.map(|s| s.volume),
                signal.volume_ratio(),
                signal.position_size(),
                signal.risk_amount(),
                signal.stop_price(),
                signal.take_profit_price(),
                reasons,
                signal.created_at().to_rfc3339(),
            ],
        )
        .map_err(|e| TradecoreError::Persistence {
            reason: e.to_string(),
        })?;

        Ok(())
    }
}
