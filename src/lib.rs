//! tradecore: EMA crossover signal engine with RSI confirmation and ATR risk sizing.
//!
//! Hexagonal architecture: decision logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`].

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod logging;
pub mod ports;
