//! Port traits implemented by adapters or by strategy code.

pub mod config_port;
pub mod controller;
pub mod data_port;
pub mod tick_sink;
