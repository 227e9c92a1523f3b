//! Static instrument facts and the fetched history bundle for one instrument.

use chrono::{DateTime, Utc};

use super::currency::{round_dp, Currency};
use super::error::FxsimError;
use super::granularity::Granularity;
use super::timeframe::Timeframe;

#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentMeta {
    pub name: String,
    pub ins_type: String,
    pub display_name: String,
    pub display_precision: u32,
    pub pip_location: i32,
    pub pip_size: f64,
    pub trade_units_precision: u32,
    pub margin_rate: f64,
    currencies: (Currency, Currency),
}

impl InstrumentMeta {
    /// `name` must be a currency pair such as `EUR_USD`.
    pub fn new(
        name: &str,
        ins_type: &str,
        display_name: &str,
        display_precision: u32,
        pip_location: i32,
        trade_units_precision: u32,
        margin_rate: f64,
    ) -> Result<Self, FxsimError> {
        let currencies = parse_pair(name)?;
        Ok(InstrumentMeta {
            name: name.to_string(),
            ins_type: ins_type.to_string(),
            display_name: display_name.to_string(),
            display_precision,
            pip_location,
            pip_size: 10f64.powi(pip_location),
            trade_units_precision,
            margin_rate,
            currencies,
        })
    }

    /// Currency that margins and profits are denominated in: the pair's second leg.
    pub fn base_currency(&self) -> Currency {
        self.currencies.1
    }

    pub fn currencies(&self) -> [Currency; 2] {
        [self.currencies.0, self.currencies.1]
    }

    pub fn round(&self, value: f64) -> f64 {
        round_dp(value, self.display_precision)
    }

    pub fn format(&self, value: f64) -> String {
        format!("{:.*}", self.display_precision as usize, self.round(value))
    }
}

fn parse_pair(name: &str) -> Result<(Currency, Currency), FxsimError> {
    let (first, second) = name.split_once('_').ok_or_else(|| FxsimError::Data {
        reason: format!("instrument name {name} is not a currency pair"),
    })?;
    Ok((first.parse()?, second.parse()?))
}

/// One instrument's metadata plus its timeframes, in registration order.
#[derive(Debug, Clone)]
pub struct InstrumentData {
    pub meta: InstrumentMeta,
    timeframes: Vec<Timeframe>,
    time_from: Option<DateTime<Utc>>,
    time_to: Option<DateTime<Utc>>,
}

impl InstrumentData {
    pub fn new(meta: InstrumentMeta) -> Self {
        InstrumentData {
            meta,
            timeframes: Vec::new(),
            time_from: None,
            time_to: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }

    /// Register a timeframe, replacing any earlier one at the same granularity.
    /// The availability window is the common coverage of what is registered.
    pub fn add_timeframe(&mut self, timeframe: Timeframe) -> Result<(), FxsimError> {
        if timeframe.symbol() != self.meta.name {
            return Err(FxsimError::SymbolMismatch {
                expected: self.meta.name.clone(),
                found: timeframe.symbol().to_string(),
            });
        }

        match self
            .timeframes
            .iter_mut()
            .find(|tf| tf.granularity() == timeframe.granularity())
        {
            Some(existing) => *existing = timeframe,
            None => self.timeframes.push(timeframe),
        }

        self.time_from = self.timeframes.iter().filter_map(Timeframe::start).max();
        self.time_to = self.timeframes.iter().filter_map(Timeframe::end).min();
        Ok(())
    }

    pub fn timeframes(&self) -> &[Timeframe] {
        &self.timeframes
    }

    pub fn timeframe(&self, granularity: Granularity) -> Option<&Timeframe> {
        self.timeframes.iter().find(|tf| tf.granularity() == granularity)
    }

    /// Finest registered timeframe; first registered wins a tie.
    pub fn timeframe_main(&self) -> Option<&Timeframe> {
        self.timeframes
            .iter()
            .reduce(|main, tf| if tf.granularity() < main.granularity() { tf } else { main })
    }

    pub fn time_from(&self) -> Option<DateTime<Utc>> {
        self.time_from
    }

    pub fn time_to(&self) -> Option<DateTime<Utc>> {
        self.time_to
    }
}
