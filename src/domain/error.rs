//! Domain error types.
//!
//! Only [`TradecoreError`] crosses the adapter boundary. The decision core
//! itself resolves every failure to a HOLD signal, so the smaller types here
//! ([`OutOfOrder`], [`ValidationError`]) are carried inside reports rather than
//! bubbled up.

use chrono::{DateTime, Utc};

/// A candle arrived with a timestamp that does not advance the window.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("out-of-order candle for {symbol}: received {received} after {last}")]
pub struct OutOfOrder {
    pub symbol: String,
    pub last: DateTime<Utc>,
    pub received: DateTime<Utc>,
}

/// A rejected parameter write. The prior parameters stay in effect.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid parameter {field}: {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: &str, reason: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Top-level error type for tradecore.
#[derive(Debug, thiserror::Error)]
pub enum TradecoreError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    OutOfOrder(#[from] OutOfOrder),

    #[error("candle source error for {symbol}: {reason}")]
    CandleSource { symbol: String, reason: String },

    #[error("account error: {reason}")]
    Account { reason: String },

    #[error("persistence error: {reason}")]
    Persistence { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&TradecoreError> for std::process::ExitCode {
    fn from(err: &TradecoreError) -> Self {
        let code: u8 = match err {
            TradecoreError::Io(_) => 1,
            TradecoreError::ConfigParse { .. }
            | TradecoreError::ConfigMissing { .. }
            | TradecoreError::ConfigInvalid { .. }
            | TradecoreError::Validation(_) => 2,
            TradecoreError::Database { .. }
            | TradecoreError::DatabaseQuery { .. }
            | TradecoreError::Persistence { .. } => 3,
            TradecoreError::CandleSource { .. } | TradecoreError::OutOfOrder(_) => 4,
            TradecoreError::Account { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
