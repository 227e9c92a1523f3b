//! Market data access port trait.

use chrono::{DateTime, Utc};

use crate::domain::error::FxsimError;
use crate::domain::granularity::Granularity;
use crate::domain::instrument::InstrumentData;

pub trait MarketDataPort {
    /// Load every symbol with one timeframe per granularity, keeping only
    /// rows within `[from, to]`.
    fn instrument_data(
        &self,
        symbols: &[String],
        granularities: &[Granularity],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<InstrumentData>, FxsimError>;

    fn list_symbols(&self) -> Result<Vec<String>, FxsimError>;
}
