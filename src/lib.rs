//! fxsim: discrete-time backtesting of leveraged currency trades.
//!
//! Hexagonal architecture: simulation logic in [`domain`], port traits in
//! [`ports`], concrete implementations in [`adapters`].

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod ports;
