//! Concrete adapter implementations for ports.

pub mod console_sink;
pub mod csv_adapter;
pub mod file_config_adapter;
