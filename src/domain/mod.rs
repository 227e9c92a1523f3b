//! Core domain types and simulation logic.

pub mod account;
pub mod candle;
pub mod config_validation;
pub mod context;
pub mod currency;
pub mod error;
pub mod granularity;
pub mod instrument;
pub mod instrument_context;
pub mod position;
pub mod row;
pub mod sim_loop;
pub mod strategy;
pub mod timeframe;
pub mod watch_list;

#[cfg(test)]
pub mod testkit;
