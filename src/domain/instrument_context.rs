//! Per-tick view of one instrument across all of its timeframes.

use chrono::{DateTime, Utc};
use std::cell::OnceCell;

use super::error::SimError;
use super::granularity::Granularity;
use super::instrument::InstrumentMeta;
use super::row::Row;
use super::timeframe::{TimeContext, Timeframe};

#[derive(Debug)]
pub struct InstrumentContext<'a> {
    time: DateTime<Utc>,
    meta: &'a InstrumentMeta,
    timeframes: Vec<TimeContext<'a>>,
    main: Option<usize>,
    price: OnceCell<Row>,
}

impl<'a> InstrumentContext<'a> {
    pub fn new(time: DateTime<Utc>, meta: &'a InstrumentMeta) -> Self {
        InstrumentContext {
            time,
            meta,
            timeframes: Vec::new(),
            main: None,
            price: OnceCell::new(),
        }
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn meta(&self) -> &'a InstrumentMeta {
        self.meta
    }

    /// Bind `timeframe` at this context's time. The finest granularity becomes
    /// the price source. A second timeframe at an already bound granularity
    /// is ignored, so the earlier registration is kept.
    pub fn add_timeframe(&mut self, timeframe: &'a Timeframe) -> Result<(), SimError> {
        if timeframe.symbol() != self.meta.name {
            return Err(SimError::SymbolMismatch {
                expected: self.meta.name.clone(),
                found: timeframe.symbol().to_string(),
            });
        }

        if self
            .timeframes
            .iter()
            .any(|tc| tc.granularity() == timeframe.granularity())
        {
            return Ok(());
        }

        let time_context = timeframe.get_context(self.time);
        let finer = self
            .timeframe_main()
            .is_none_or(|main| time_context.granularity() < main.granularity());
        self.timeframes.push(time_context);
        if finer {
            self.main = Some(self.timeframes.len() - 1);
        }
        Ok(())
    }

    pub fn timeframe_main(&self) -> Option<&TimeContext<'a>> {
        self.main.map(|i| &self.timeframes[i])
    }

    pub fn timeframes(&self) -> &[TimeContext<'a>] {
        &self.timeframes
    }

    pub fn get_timeframe(&self, granularity: Granularity) -> Result<&TimeContext<'a>, SimError> {
        self.timeframes
            .iter()
            .find(|tc| tc.granularity() == granularity)
            .ok_or_else(|| SimError::TimeframeNotFound {
                symbol: self.meta.name.clone(),
                granularity,
            })
    }

    /// Latest row of the main timeframe, computed once per context.
    pub fn price(&self) -> Result<&Row, SimError> {
        if let Some(row) = self.price.get() {
            return Ok(row);
        }
        let main = self.timeframe_main().ok_or_else(|| SimError::NoTimeframes {
            symbol: self.meta.name.clone(),
        })?;
        let row = *main.latest()?;
        Ok(self.price.get_or_init(|| row))
    }

    /// ask close - bid close, in display precision.
    pub fn spread(&self) -> Result<f64, SimError> {
        let price = self.price()?;
        Ok(self.meta.round(price.ask.close - price.bid.close))
    }
}
