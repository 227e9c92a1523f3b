//! Domain error types.
//!
//! [`SimError`] covers conditions a tick can recover from: the loop records
//! them as the tick's result and keeps going. [`FxsimError`] covers setup and
//! data problems that abort a run before the first tick.

use chrono::{DateTime, Utc};

use super::granularity::Granularity;
use super::position::PositionId;

/// Recoverable, tick-scoped failure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimError {
    #[error("no current candle available for tick ({symbol}, {granularity})")]
    NoCurrentCandle {
        symbol: String,
        granularity: Granularity,
    },

    #[error("no data available for tick ({symbol}, {granularity})")]
    NoData {
        symbol: String,
        granularity: Granularity,
    },

    #[error("instrument {name} not found")]
    InstrumentNotFound { name: String },

    #[error("timeframe {granularity} not found for {symbol}")]
    TimeframeNotFound {
        symbol: String,
        granularity: Granularity,
    },

    #[error("instrument {symbol} has no timeframes")]
    NoTimeframes { symbol: String },

    #[error("symbol does not match: {found} != {expected}")]
    SymbolMismatch { expected: String, found: String },

    #[error("position {id} already closed")]
    PositionAlreadyClosed { id: PositionId },

    #[error("position {id} not found")]
    PositionNotFound { id: PositionId },

    #[error("balance {balance} too low for margin {margin}")]
    BalanceTooLow { balance: f64, margin: f64 },

    #[error("account is not bound to the context at {time}")]
    ContextNotBound { time: DateTime<Utc> },

    #[error("{reason}")]
    Strategy { reason: String },
}

impl SimError {
    /// Short stable name used when a failed tick is written to the output log.
    pub fn kind(&self) -> &'static str {
        match self {
            SimError::NoCurrentCandle { .. } => "NoCurrentCandle",
            SimError::NoData { .. } => "NoData",
            SimError::InstrumentNotFound { .. } => "InstrumentNotFound",
            SimError::TimeframeNotFound { .. } => "TimeframeNotFound",
            SimError::NoTimeframes { .. } => "NoTimeframes",
            SimError::SymbolMismatch { .. } => "SymbolMismatch",
            SimError::PositionAlreadyClosed { .. } => "PositionAlreadyClosed",
            SimError::PositionNotFound { .. } => "PositionNotFound",
            SimError::BalanceTooLow { .. } => "BalanceTooLow",
            SimError::ContextNotBound { .. } => "ContextNotBound",
            SimError::Strategy { .. } => "Strategy",
        }
    }
}

/// Top-level error type for fxsim.
#[derive(Debug, thiserror::Error)]
pub enum FxsimError {
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

    #[error("unknown currency {code}")]
    UnknownCurrency { code: String },

    #[error("unknown granularity {code}")]
    UnknownGranularity { code: String },

    #[error("start time {start} is before the beginning of time")]
    PeriodBeforeEpoch { start: DateTime<Utc> },

    #[error("end time {end} is before start time {start}")]
    PeriodRangeInverted {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("period size must be positive")]
    InvalidPeriodSize,

    #[error("timeframe for {found} cannot be added to instrument {expected}")]
    SymbolMismatch { expected: String, found: String },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("no data for {symbol}")]
    NoData { symbol: String },

    #[error("simulation window {from} .. {to} is outside available data {available_from} .. {available_to}")]
    WindowOutOfRange {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        available_from: DateTime<Utc>,
        available_to: DateTime<Utc>,
    },

    #[error("simulation window starts at {from} after it ends at {to}")]
    InvalidWindow {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },

    #[error(transparent)]
    Sim(#[from] SimError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&FxsimError> for std::process::ExitCode {
    fn from(err: &FxsimError) -> Self {
        let code: u8 = match err {
            FxsimError::Io(_) => 1,
            FxsimError::ConfigParse { .. }
            | FxsimError::ConfigMissing { .. }
            | FxsimError::ConfigInvalid { .. }
            | FxsimError::UnknownCurrency { .. }
            | FxsimError::UnknownGranularity { .. } => 2,
            FxsimError::Data { .. }
            | FxsimError::NoData { .. }
            | FxsimError::SymbolMismatch { .. } => 3,
            FxsimError::PeriodBeforeEpoch { .. }
            | FxsimError::PeriodRangeInverted { .. }
            | FxsimError::InvalidPeriodSize
            | FxsimError::WindowOutOfRange { .. }
            | FxsimError::InvalidWindow { .. } => 4,
            FxsimError::Sim(_) => 5,
        };
        std::process::ExitCode::from(code)
    }
}
