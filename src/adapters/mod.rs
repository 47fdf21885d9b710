//! Concrete adapter implementations for ports.

pub mod counting_sink;
pub mod csv_adapter;
pub mod file_config_adapter;
pub mod fixed_account_adapter;
#[cfg(feature = "sqlite")]
pub mod sqlite_adapter;
