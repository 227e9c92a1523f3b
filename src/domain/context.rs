//! Snapshot of every registered instrument at one simulated time.
//!
//! A `Context` lives for exactly one tick. It only borrows the loop's
//! instrument data, so building one per tick allocates a handful of small
//! vectors and never copies candle history.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use super::error::SimError;
use super::instrument::InstrumentData;
use super::instrument_context::InstrumentContext;

#[derive(Debug)]
pub struct Context<'a> {
    time: DateTime<Utc>,
    instruments: HashMap<String, InstrumentContext<'a>>,
}

impl<'a> Context<'a> {
    pub fn new(time: DateTime<Utc>) -> Self {
        Context {
            time,
            instruments: HashMap::new(),
        }
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn add_instrument(&mut self, data: &'a InstrumentData) -> Result<(), SimError> {
        let mut instrument = InstrumentContext::new(self.time, &data.meta);
        for timeframe in data.timeframes() {
            instrument.add_timeframe(timeframe)?;
        }
        self.instruments.insert(data.meta.name.clone(), instrument);
        Ok(())
    }

    pub fn get_instrument(&self, name: &str) -> Result<&InstrumentContext<'a>, SimError> {
        self.instruments
            .get(name)
            .ok_or_else(|| SimError::InstrumentNotFound {
                name: name.to_string(),
            })
    }

    pub fn instruments(&self) -> impl Iterator<Item = &InstrumentContext<'a>> {
        self.instruments.values()
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }
}
