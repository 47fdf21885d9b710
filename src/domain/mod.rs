//! Decision core: candles, indicators, signals, sizing and the per-symbol engine.

pub mod candle;
pub mod config_validation;
pub mod engine;
pub mod error;
pub mod indicator;
pub mod parameters;
pub mod performance;
pub mod risk;
pub mod signal;
