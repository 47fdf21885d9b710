//! CSV candle replay source.
//!
//! Expected header: `symbol,timestamp,open,high,low,close,volume`. Timestamps
//! are RFC 3339 or `YYYY-MM-DD HH:MM:SS` (read as UTC). Rows are replayed per
//! symbol in file order, so an out-of-order row reaches the engine as such.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::domain::candle::Candle;
use crate::domain::error::TradecoreError;
use crate::ports::candle_port::CandleSource;

pub struct CsvCandleSource {
    candles: HashMap<String, Vec<Candle>>,
    cursors: Mutex<HashMap<String, usize>>,
}

impl CsvCandleSource {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, TradecoreError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| TradecoreError::CandleSource {
            symbol: "*".into(),
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;
        Self::from_csv(&content)
    }

    pub fn from_csv(content: &str) -> Result<Self, TradecoreError> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        let mut candles: HashMap<String, Vec<Candle>> = HashMap::new();

        for (row, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| parse_error(row, format!("CSV parse error: {e}")))?;

            let symbol = record
                .get(0)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| parse_error(row, "missing symbol column"))?
                .to_uppercase();
            let raw_ts = record
                .get(1)
                .ok_or_else(|| parse_error(row, "missing timestamp column"))?;
            let timestamp = parse_timestamp(raw_ts)
                .ok_or_else(|| parse_error(row, format!("invalid timestamp: {raw_ts}")))?;

            let candle = Candle {
                timestamp,
                open: number(&record, row, 2, "open")?,
                high: number(&record, row, 3, "high")?,
                low: number(&record, row, 4, "low")?,
                close: number(&record, row, 5, "close")?,
                volume: number(&record, row, 6, "volume")?,
                symbol: symbol.clone(),
            };
            candles.entry(symbol).or_default().push(candle);
        }

        Ok(Self {
            candles,
            cursors: Mutex::new(HashMap::new()),
        })
    }

    /// Symbols present in the file, sorted.
    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.candles.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    fn series(&self, symbol: &str) -> Result<&[Candle], TradecoreError> {
        self.candles
            .get(symbol)
            .map(Vec::as_slice)
            .ok_or_else(|| TradecoreError::CandleSource {
                symbol: symbol.to_string(),
                reason: "no candles for symbol".into(),
            })
    }
}

impl CandleSource for CsvCandleSource {
    fn latest(&self, symbol: &str) -> Result<Option<Candle>, TradecoreError> {
        let series = self.series(symbol)?;
        let mut cursors = self.cursors.lock().unwrap_or_else(PoisonError::into_inner);
        let cursor = cursors.entry(symbol.to_string()).or_insert(0);
        let next = series.get(*cursor).cloned();
        if next.is_some() {
            *cursor += 1;
        }
        Ok(next)
    }

    /// The candles replayed so far, re-ordered by timestamp with duplicate
    /// timestamps dropped, newest `limit` kept.
    fn history(&self, symbol: &str, limit: usize) -> Result<Vec<Candle>, TradecoreError> {
        let series = self.series(symbol)?;
        let replayed = {
            let cursors = self.cursors.lock().unwrap_or_else(PoisonError::into_inner);
            cursors.get(symbol).copied().unwrap_or(0)
        };

        let mut history = series[..replayed].to_vec();
        history.sort_by_key(|c| c.timestamp);
        history.dedup_by_key(|c| c.timestamp);
        let skip = history.len().saturating_sub(limit);
        Ok(history.split_off(skip))
    }
}

fn parse_error(row: usize, reason: impl Into<String>) -> TradecoreError {
    TradecoreError::CandleSource {
        symbol: "*".into(),
        reason: format!("row {}: {}", row + 1, reason.into()),
    }
}

fn number(
    record: &csv::StringRecord,
    row: usize,
    index: usize,
    name: &str,
) -> Result<f64, TradecoreError> {
    let value: f64 = record
        .get(index)
        .ok_or_else(|| parse_error(row, format!("missing {name} column")))?
        .parse()
        .map_err(|e| parse_error(row, format!("invalid {name} value: {e}")))?;
    if !value.is_finite() || value < 0.0 {
        return Err(parse_error(
            row,
            format!("{name} must be a finite non-negative number, got {value}"),
        ));
    }
    Ok(value)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}
