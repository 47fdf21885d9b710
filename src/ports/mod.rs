//! Port traits the domain talks through.

pub mod account_port;
pub mod candle_port;
pub mod config_port;
pub mod signal_port;
