//! One sampled instant of an instrument: volume plus ask/bid/mid candles.

use chrono::{DateTime, Utc};

use super::candle::Candle;

/// Which quote a candle was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PriceSide {
    Ask,
    Bid,
    Mid,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Row {
    pub time: DateTime<Utc>,
    pub volume: i64,
    pub complete: bool,
    /// Set when this row stands in for a later, missing instant.
    pub delayed: bool,
    pub ask: Candle,
    pub bid: Candle,
    pub mid: Candle,
}

impl Row {
    pub fn candle(&self, side: PriceSide) -> &Candle {
        match side {
            PriceSide::Ask => &self.ask,
            PriceSide::Bid => &self.bid,
            PriceSide::Mid => &self.mid,
        }
    }

    pub fn with_delayed(self, delayed: bool) -> Self {
        Row { delayed, ..self }
    }
}
